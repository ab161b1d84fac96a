//! Session-cookie authentication and role checks.
//!
//! Login stores a row in `sessions` and hands the id back in an http-only
//! `session_id` cookie. Every protected handler takes a [`CurrentUser`]
//! argument; extracting it resolves the cookie against `sessions` and
//! `users` and rejects unknown, expired or deactivated sessions.

use std::future::Future;
use std::pin::Pin;

use actix_web::{cookie::Cookie, dev::Payload, web, FromRequest, HttpRequest};
use log::{info, warn};
use sqlx::MySqlPool;
use time::OffsetDateTime;

use crate::error::ApiError;
use crate::models::session::SessionUser;
use crate::models::user::{AccountStatus, UserType};

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub user_type: UserType,
    pub manager_id: Option<i32>,
    pub department_id: Option<i32>,
    pub session_id: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    pub fn is_manager(&self) -> bool {
        self.user_type == UserType::Manager
    }

    pub fn is_doer(&self) -> bool {
        self.user_type == UserType::Doer
    }

    pub fn is_client(&self) -> bool {
        self.user_type == UserType::Client
    }

    pub fn require_any(&self, allowed: &[UserType], action: &str) -> Result<(), ApiError> {
        if allowed.contains(&self.user_type) {
            Ok(())
        } else {
            info!("User {} ({}) denied: {}", self.username, self.user_type, action);
            Err(ApiError::Forbidden(format!("You are not allowed to {}", action)))
        }
    }

    pub fn require_admin(&self, action: &str) -> Result<(), ApiError> {
        self.require_any(&[UserType::Admin], action)
    }

    pub fn require_staff(&self, action: &str) -> Result<(), ApiError> {
        self.require_any(&[UserType::Admin, UserType::Manager], action)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionState {
    Valid,
    Expired,
    Inactive,
}

pub fn session_state(row: &SessionUser, now: OffsetDateTime) -> SessionState {
    if row.expires_at < now {
        SessionState::Expired
    } else if row.status.parse::<AccountStatus>() != Ok(AccountStatus::Active) {
        SessionState::Inactive
    } else {
        SessionState::Valid
    }
}

pub async fn load_current_user(pool: &MySqlPool, session_id: &str) -> Result<CurrentUser, ApiError> {
    let row = sqlx::query_as::<_, SessionUser>(
        "SELECT s.session_id, s.expires_at, u.id AS user_id, u.username, u.name, u.user_type, \
                u.Status, u.manager_id, u.department_id
         FROM sessions s
         JOIN users u ON s.user_id = u.id
         WHERE s.session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => {
            info!("Invalid session ID: {}", session_id);
            return Err(ApiError::Unauthenticated("Invalid session, please log in".into()));
        }
    };

    match session_state(&row, OffsetDateTime::now_utc()) {
        SessionState::Valid => {}
        SessionState::Expired => {
            sqlx::query("DELETE FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .execute(pool)
                .await?;
            info!("Session expired for user {}", row.username);
            return Err(ApiError::Unauthenticated("Login is needed, session expired".into()));
        }
        SessionState::Inactive => {
            info!("Inactive account {} tried to use a session", row.username);
            return Err(ApiError::Unauthenticated("Your account is inactive".into()));
        }
    }

    let user_type = row.user_type.parse::<UserType>().map_err(|e| {
        warn!("User {} has unusable user_type: {}", row.username, e);
        ApiError::Forbidden("Your account has no valid role".into())
    })?;

    Ok(CurrentUser {
        id: row.user_id,
        username: row.username,
        name: row.name,
        user_type,
        manager_id: row.manager_id,
        department_id: row.department_id,
        session_id: row.session_id,
    })
}

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let session_id = req.cookie(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
        let pool = req.app_data::<web::Data<MySqlPool>>().cloned();

        Box::pin(async move {
            let session_id = match session_id {
                Some(id) if !id.is_empty() => id,
                _ => return Err(ApiError::Unauthenticated("Please log in to continue".into())),
            };
            let pool = pool.ok_or_else(|| ApiError::Internal("Database pool is not configured".into()))?;
            load_current_user(pool.get_ref(), &session_id).await
        })
    }
}

pub fn session_cookie(session_id: &str, persistent_days: Option<i64>) -> Cookie<'static> {
    let mut builder = Cookie::build(SESSION_COOKIE, session_id.to_string())
        .path("/")
        .http_only(true);
    if let Some(days) = persistent_days {
        builder = builder.max_age(actix_web::cookie::time::Duration::days(days));
    }
    builder.finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn session(status: &str, expires_in: Duration) -> SessionUser {
        SessionUser {
            session_id: "abc".into(),
            expires_at: OffsetDateTime::now_utc() + expires_in,
            user_id: 4,
            username: "ravi".into(),
            name: "Ravi".into(),
            user_type: "doer".into(),
            status: status.into(),
            manager_id: Some(2),
            department_id: None,
        }
    }

    fn user(user_type: UserType) -> CurrentUser {
        CurrentUser {
            id: 1,
            username: "meera".into(),
            name: "Meera".into(),
            user_type,
            manager_id: None,
            department_id: None,
            session_id: "s".into(),
        }
    }

    #[test]
    fn live_active_session_is_valid() {
        let row = session("Active", Duration::minutes(5));
        assert_eq!(session_state(&row, OffsetDateTime::now_utc()), SessionState::Valid);
    }

    #[test]
    fn past_expiry_is_expired_even_for_inactive_users() {
        let row = session("Inactive", Duration::minutes(-5));
        assert_eq!(session_state(&row, OffsetDateTime::now_utc()), SessionState::Expired);
    }

    #[test]
    fn inactive_account_is_rejected() {
        let row = session("Inactive", Duration::minutes(5));
        assert_eq!(session_state(&row, OffsetDateTime::now_utc()), SessionState::Inactive);
    }

    #[test]
    fn staff_check_admits_admins_and_managers_only() {
        assert!(user(UserType::Admin).require_staff("create tasks").is_ok());
        assert!(user(UserType::Manager).require_staff("create tasks").is_ok());
        assert!(matches!(
            user(UserType::Doer).require_staff("create tasks"),
            Err(ApiError::Forbidden(_))
        ));
        assert!(user(UserType::Client).require_admin("reset sessions").is_err());
    }

    #[test]
    fn persistent_cookie_gets_a_max_age() {
        let cookie = session_cookie("xyz", Some(10));
        assert_eq!(cookie.value(), "xyz");
        assert_eq!(cookie.http_only(), Some(true));
        assert!(cookie.max_age().is_some());
        assert!(session_cookie("xyz", None).max_age().is_none());
    }
}
