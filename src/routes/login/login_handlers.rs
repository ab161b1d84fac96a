use actix_web::{web, HttpResponse, Responder};
use bcrypt::verify;
use log::{error, info};
use sqlx::MySqlPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::login_models::{AutoLoginResponse, LoginRequest, LoginResponse, SessionUserInfo};
use crate::auth::{removal_cookie, session_cookie, CurrentUser};
use crate::config::Config;
use crate::error::ApiError;
use crate::models::user::{User, UserType};
use crate::response::{merge_envelope, success};
use crate::routes::form::is_truthy;

pub async fn login_get() -> impl Responder {
    info!("Received request on /login_get endpoint");
    HttpResponse::Ok().body("Task tracker login endpoint.")
}

// login logic
pub async fn login(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    request: web::Form<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let username = request.username.trim();
    let remember_me = is_truthy(request.remember_me.as_deref());
    info!("Received login request for user: {}", username);

    if username.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest("Username and password are required".into()));
    }

    // 1. Get the user data from the database with username
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, name, email, user_type, manager_id, manager, Status, department_id
         FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool.get_ref())
    .await?;

    let user = match user {
        Some(user) => user,
        None => {
            info!("Invalid username: {}", username);
            return Err(ApiError::Unauthenticated("Invalid username or password".into()));
        }
    };

    // 2. Validate hashed password in DB and given password
    let valid = match verify(&request.password, &user.password) {
        Ok(valid) => valid,
        Err(e) => {
            error!("Error when checking password for user {}: {}", username, e);
            return Err(ApiError::Unauthenticated("Error when checking password".into()));
        }
    };

    if !valid {
        info!("Invalid password for user: {}", username);
        return Err(ApiError::Unauthenticated("Invalid username or password".into()));
    }

    if !user.is_active() {
        info!("Inactive user {} tried to log in", username);
        return Err(ApiError::Forbidden("Your account is inactive".into()));
    }

    let user_type = user
        .user_type
        .parse::<UserType>()
        .map_err(|_| ApiError::Forbidden("Your account has no valid role".into()))?;

    // 3. Generate a new session ID
    let new_session_id = Uuid::new_v4().to_string();
    let expires_at = if remember_me {
        OffsetDateTime::now_utc() + Duration::days(config.remember_me_days)
    } else {
        OffsetDateTime::now_utc() + Duration::minutes(config.session_ttl_minutes)
    };

    sqlx::query(
        "INSERT INTO sessions (session_id, user_id, expires_at, is_persistent) VALUES (?, ?, ?, ?)",
    )
    .bind(&new_session_id)
    .bind(user.id)
    .bind(expires_at)
    .bind(remember_me)
    .execute(pool.get_ref())
    .await?;

    // 4. Return session ID inside a cookie to the client
    info!("User {} logged in successfully", username);
    let body = merge_envelope(
        "success",
        "Login successful".into(),
        LoginResponse {
            user: SessionUserInfo {
                id: user.id,
                username: user.username,
                name: user.name,
                user_type: user_type.as_str().to_string(),
            },
        },
    )?;
    let persistent_days = remember_me.then_some(config.remember_me_days);
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&new_session_id, persistent_days))
        .json(body))
}

// auto_login logic: the extractor already validated the cookie session
pub async fn auto_login(user: CurrentUser) -> Result<HttpResponse, ApiError> {
    info!("Auto login successful for user: {}", user.username);
    let body = merge_envelope(
        "success",
        format!("Welcome back, {}", user.name),
        AutoLoginResponse {
            user: SessionUserInfo {
                id: user.id,
                username: user.username.clone(),
                name: user.name.clone(),
                user_type: user.user_type.as_str().to_string(),
            },
        },
    )?;
    Ok(HttpResponse::Ok().json(body))
}

pub async fn logout(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    info!("Received logout request for user: {}", user.username);

    sqlx::query("DELETE FROM sessions WHERE session_id = ?")
        .bind(&user.session_id)
        .execute(pool.get_ref())
        .await?;

    info!("Logout successful for user: {}", user.username);
    let mut response = success("Logout successful");
    response.add_cookie(&removal_cookie()).map_err(|e| {
        ApiError::Internal(format!("Failed to clear session cookie: {}", e))
    })?;
    Ok(response)
}
