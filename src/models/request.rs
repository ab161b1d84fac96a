use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeaveRequest {
    pub id: i32,
    pub user_id: i32,
    #[sqlx(default)]
    pub username: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: String,
    pub decided_by: Option<i32>,
    pub decided_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MeetingRequest {
    pub id: i32,
    pub requester_id: i32,
    pub with_user_id: i32,
    pub agenda: String,
    pub proposed_at: NaiveDateTime,
    pub scheduled_at: Option<NaiveDateTime>,
    pub status: String,
    pub created_at: NaiveDateTime,
}
