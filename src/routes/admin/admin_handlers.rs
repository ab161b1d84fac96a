use actix_web::{web, HttpResponse};
use log::info;
use sqlx::MySqlPool;
use time::OffsetDateTime;

use super::admin_models::SessionsDeletedResponse;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::response::success_with;

// Logs everyone out, the caller included.
pub async fn session_reset(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    user.require_admin("reset sessions")?;

    // Attempt to delete all sessions from the sessions table
    let deleted = sqlx::query("DELETE FROM sessions")
        .execute(pool.get_ref())
        .await?
        .rows_affected();

    info!("{} reset all {} sessions", user.username, deleted);
    success_with(
        "All sessions have been reset successfully",
        SessionsDeletedResponse { deleted },
    )
}

pub async fn purge_expired_sessions(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    user.require_admin("purge sessions")?;

    let deleted = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(OffsetDateTime::now_utc())
        .execute(pool.get_ref())
        .await?
        .rows_affected();

    info!("{} purged {} expired sessions", user.username, deleted);
    success_with(
        format!("{} expired sessions removed", deleted),
        SessionsDeletedResponse { deleted },
    )
}
