use serde::{Deserialize, Serialize};

use crate::models::notification::NotificationView;
use crate::notify::ReminderCounts;
use crate::routes::form::empty_as_none;

#[derive(Deserialize)]
pub struct ListNotificationsQuery {
    pub unread_only: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ListNotificationsResponse {
    pub notifications: Vec<NotificationView>,
    pub unread_count: i64,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}


#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub notification_id: i32,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub marked: u64,
}


#[derive(Serialize)]
pub struct GenerateRemindersResponse {
    pub created: ReminderCounts,
}
