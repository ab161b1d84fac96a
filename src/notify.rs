use chrono::NaiveDateTime;
use log::{info, warn};
use serde_json::json;
use sqlx::{MySql, MySqlPool};

use crate::delay;
use crate::models::notification::{ActionButton, NotificationType};

#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub user_id: i32,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub related_type: Option<&'static str>,
    pub action_required: bool,
    pub action_data: Option<String>,
}

impl NotificationDraft {
    pub fn new(user_id: i32, kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        NotificationDraft {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            related_id: None,
            related_type: None,
            action_required: false,
            action_data: None,
        }
    }

    pub fn related(mut self, related_type: &'static str, related_id: i32) -> Self {
        self.related_type = Some(related_type);
        self.related_id = Some(related_id);
        self
    }

    /// Marks the notification as needing a decision and attaches the UI buttons.
    pub fn with_buttons(mut self, buttons: &[ActionButton]) -> Self {
        self.action_required = true;
        self.action_data = Some(json!({ "buttons": buttons }).to_string());
        self
    }
}

pub async fn push<'e, E>(executor: E, draft: &NotificationDraft) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let result = sqlx::query(
        "INSERT INTO notifications
            (user_id, type, title, message, related_id, related_type, is_read, action_required, action_data, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
    )
    .bind(draft.user_id)
    .bind(draft.kind.as_str())
    .bind(&draft.title)
    .bind(&draft.message)
    .bind(draft.related_id)
    .bind(draft.related_type)
    .bind(draft.action_required)
    .bind(&draft.action_data)
    .bind(delay::now())
    .execute(executor)
    .await?;

    Ok(result.last_insert_id())
}

/// Notification delivery never fails the action that triggered it.
pub async fn push_logged(pool: &MySqlPool, draft: &NotificationDraft) {
    if let Err(e) = push(pool, draft).await {
        warn!(
            "Failed to store {} notification for user {}: {}",
            draft.kind.as_str(),
            draft.user_id,
            e
        );
    }
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ReminderCounts {
    pub delegation: u64,
    pub checklist: u64,
}

/// Copies overdue pending work into `task_delayed` notifications, once per task.
pub async fn generate_delay_reminders(pool: &MySqlPool, now: NaiveDateTime) -> Result<ReminderCounts, sqlx::Error> {
    let kind = NotificationType::TaskDelayed.as_str();

    let delegation = sqlx::query(
        "INSERT INTO notifications
            (user_id, type, title, message, related_id, related_type, is_read, action_required, action_data, created_at)
         SELECT t.doer_id, ?, 'Task overdue',
                CONCAT('Task \"', LEFT(t.description, 120), '\" is past its planned time'),
                t.id, 'delegation', 0, 0, NULL, ?
         FROM tasks t
         WHERE t.status = 'pending'
           AND TIMESTAMP(t.planned_date, COALESCE(t.planned_time, '23:59:59')) < ?
           AND NOT EXISTS (
               SELECT 1 FROM notifications n
               WHERE n.related_type = 'delegation' AND n.related_id = t.id AND n.type = ?
           )",
    )
    .bind(kind)
    .bind(now)
    .bind(now)
    .bind(kind)
    .execute(pool)
    .await?
    .rows_affected();

    let checklist = sqlx::query(
        "INSERT INTO notifications
            (user_id, type, title, message, related_id, related_type, is_read, action_required, action_data, created_at)
         SELECT u.id, ?, 'Checklist task overdue',
                CONCAT('Checklist task \"', LEFT(c.description, 120), '\" for ', DATE_FORMAT(c.task_date, '%Y-%m-%d'), ' is overdue'),
                c.id, 'checklist', 0, 0, NULL, ?
         FROM checklist_subtasks c
         JOIN users u ON u.username = c.assignee
         WHERE c.status = 'pending'
           AND TIMESTAMP(c.task_date, '23:59:59') < ?
           AND NOT EXISTS (
               SELECT 1 FROM notifications n
               WHERE n.related_type = 'checklist' AND n.related_id = c.id AND n.type = ?
           )",
    )
    .bind(kind)
    .bind(now)
    .bind(now)
    .bind(kind)
    .execute(pool)
    .await?
    .rows_affected();

    if delegation + checklist > 0 {
        info!(
            "Generated {} delegation and {} checklist overdue reminders",
            delegation, checklist
        );
    }

    Ok(ReminderCounts { delegation, checklist })
}
