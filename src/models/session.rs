use sqlx::FromRow;
use time::OffsetDateTime;

// Session joined with the owning user, as read by the auth extractor.
#[derive(Debug, FromRow)]
pub struct SessionUser {
    pub session_id: String,
    pub expires_at: OffsetDateTime,
    pub user_id: i32,
    pub username: String,
    pub name: String,
    pub user_type: String,
    #[sqlx(rename = "Status")]
    pub status: String,
    pub manager_id: Option<i32>,
    pub department_id: Option<i32>,
}
