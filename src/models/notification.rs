use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskCompleted,
    TaskDelayed,
    TaskShifted,
    ChecklistAssigned,
    LeaveRequest,
    LeaveApproved,
    LeaveRejected,
    MeetingRequest,
    MeetingApproved,
    MeetingRescheduled,
    MeetingRejected,
    AccountStatus,
}

impl NotificationType {
    #[cfg(test)]
    pub const ALL: [NotificationType; 13] = [
        NotificationType::TaskAssigned,
        NotificationType::TaskCompleted,
        NotificationType::TaskDelayed,
        NotificationType::TaskShifted,
        NotificationType::ChecklistAssigned,
        NotificationType::LeaveRequest,
        NotificationType::LeaveApproved,
        NotificationType::LeaveRejected,
        NotificationType::MeetingRequest,
        NotificationType::MeetingApproved,
        NotificationType::MeetingRescheduled,
        NotificationType::MeetingRejected,
        NotificationType::AccountStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::TaskAssigned => "task_assigned",
            NotificationType::TaskCompleted => "task_completed",
            NotificationType::TaskDelayed => "task_delayed",
            NotificationType::TaskShifted => "task_shifted",
            NotificationType::ChecklistAssigned => "checklist_assigned",
            NotificationType::LeaveRequest => "leave_request",
            NotificationType::LeaveApproved => "leave_approved",
            NotificationType::LeaveRejected => "leave_rejected",
            NotificationType::MeetingRequest => "meeting_request",
            NotificationType::MeetingApproved => "meeting_approved",
            NotificationType::MeetingRescheduled => "meeting_rescheduled",
            NotificationType::MeetingRejected => "meeting_rejected",
            NotificationType::AccountStatus => "account_status",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub related_type: Option<String>,
    pub is_read: bool,
    pub action_required: bool,
    pub action_data: Option<String>,
    pub created_at: NaiveDateTime,
}

/// What the API returns: `action_data` decoded back into JSON for the UI buttons.
#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub related_type: Option<String>,
    pub is_read: bool,
    pub action_required: bool,
    pub action_data: Option<Value>,
    pub created_at: NaiveDateTime,
}

impl From<Notification> for NotificationView {
    fn from(row: Notification) -> Self {
        // Rows written by older tooling may hold free text; pass it through as a string.
        let action_data = row.action_data.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(Value::String(raw))
        });
        NotificationView {
            id: row.id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            related_id: row.related_id,
            related_type: row.related_type,
            is_read: row.is_read,
            action_required: row.action_required,
            action_data,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionButton {
    pub label: String,
    pub action: String,
    pub id: i32,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(action_data: Option<&str>) -> Notification {
        Notification {
            id: 7,
            user_id: 3,
            kind: "leave_request".into(),
            title: "Leave request".into(),
            message: "asha requested leave".into(),
            related_id: Some(12),
            related_type: Some("leave".into()),
            is_read: false,
            action_required: true,
            action_data: action_data.map(str::to_string),
            created_at: NaiveDate::from_ymd_opt(2024, 4, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn type_names_match_serde_names() {
        for kind in NotificationType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn action_data_is_decoded_into_json() {
        let view = NotificationView::from(row(Some(r#"{"buttons":[{"label":"Approve"}]}"#)));
        assert_eq!(view.action_data.unwrap()["buttons"][0]["label"], "Approve");
    }

    #[test]
    fn non_json_action_data_is_kept_as_text() {
        let view = NotificationView::from(row(Some("approve:12")));
        assert_eq!(view.action_data, Some(Value::String("approve:12".into())));
    }
}
