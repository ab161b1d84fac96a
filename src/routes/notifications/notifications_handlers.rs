use actix_web::{web, HttpResponse};
use log::info;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::notifications_models::{
    GenerateRemindersResponse, ListNotificationsQuery, ListNotificationsResponse, MarkAllReadResponse,
    MarkReadRequest, UnreadCountResponse,
};
use crate::auth::CurrentUser;
use crate::delay;
use crate::error::ApiError;
use crate::models::notification::{Notification, NotificationView};
use crate::notify;
use crate::response::{success, success_with};
use crate::routes::form::is_truthy;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

async fn unread_count_for(pool: &MySqlPool, user_id: i32) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

// Handler to get the caller's notifications, newest first
pub async fn list_notifications(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    query: web::Query<ListNotificationsQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = clamp_limit(query.limit);

    let mut builder = QueryBuilder::<MySql>::new(
        "SELECT id, user_id, type, title, message, related_id, related_type, is_read, action_required,
                action_data, created_at
         FROM notifications WHERE user_id = ",
    );
    builder.push_bind(user.id);
    if is_truthy(query.unread_only.as_deref()) {
        builder.push(" AND is_read = 0");
    }
    builder
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(limit);

    let notifications: Vec<NotificationView> = builder
        .build_query_as::<Notification>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(NotificationView::from)
        .collect();
    let unread_count = unread_count_for(pool.get_ref(), user.id).await?;

    success_with(
        format!("{} notifications", notifications.len()),
        ListNotificationsResponse {
            notifications,
            unread_count,
        },
    )
}

pub async fn unread_count(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let unread_count = unread_count_for(pool.get_ref(), user.id).await?;
    success_with("Unread notifications", UnreadCountResponse { unread_count })
}

pub async fn mark_read(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<MarkReadRequest>,
) -> Result<HttpResponse, ApiError> {
    // Ownership is checked separately so that re-marking a read row is not a 404.
    let owner: Option<i32> = sqlx::query_scalar("SELECT user_id FROM notifications WHERE id = ?")
        .bind(request.notification_id)
        .fetch_optional(pool.get_ref())
        .await?;
    if owner != Some(user.id) {
        return Err(ApiError::NotFound("Notification not found".into()));
    }

    sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
        .bind(request.notification_id)
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    Ok(success("Notification marked as read"))
}

pub async fn mark_all_read(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let marked = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
        .bind(user.id)
        .execute(pool.get_ref())
        .await?
        .rows_affected();

    info!("{} marked {} notifications as read", user.username, marked);
    success_with("All notifications marked as read", MarkAllReadResponse { marked })
}

// Handler to run the overdue sweep on demand
pub async fn generate_reminders(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    user.require_admin("generate reminders")?;

    let created = notify::generate_delay_reminders(pool.get_ref(), delay::now())
        .await?;

    success_with(
        format!("{} reminders created", created.delegation + created.checklist),
        GenerateRemindersResponse { created },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_is_capped() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(5000)), 200);
        assert_eq!(clamp_limit(Some(0)), 1);
    }
}
