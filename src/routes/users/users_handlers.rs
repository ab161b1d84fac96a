use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use bcrypt::{hash, verify, DEFAULT_COST};
use log::{error, info};
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::users_models::{
    ChangePasswordRequest, CheckUsernameRequest, CheckUsernameResponse, CreateUserRequest,
    CreateUserResponse, ListUsersQuery, ListUsersResponse, UpdateUserStatusRequest,
    UpdateUserStatusResponse,
};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::notification::NotificationType;
use crate::models::user::{AccountStatus, UserSummary, UserType};
use crate::notify::{self, NotificationDraft};
use crate::response::{success, success_with};
use crate::routes::form::required_text;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Client accounts own the client users that log in on their behalf.
pub fn cascades_to_client_users(user_type: &str) -> bool {
    user_type.parse::<UserType>() == Ok(UserType::Client)
}

pub fn validate_status_change(actor_id: i32, target_id: i32, new_status: AccountStatus) -> Result<(), ApiError> {
    if actor_id == target_id && new_status == AccountStatus::Inactive {
        return Err(ApiError::BadRequest("You cannot deactivate your own account".into()));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<String, ApiError> {
    let username = required_text("username", username)?;
    if username.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest("username cannot contain spaces".into()));
    }
    Ok(username)
}

// Handler to list users visible to the caller
pub async fn list_users(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    query: web::Query<ListUsersQuery>,
) -> Result<HttpResponse, ApiError> {
    user.require_staff("list users")?;

    let user_type = match query.user_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<UserType>().map_err(ApiError::BadRequest)?),
    };

    let mut builder = QueryBuilder::<MySql>::new(
        "SELECT id, username, name, email, user_type, manager_id, manager, Status, department_id
         FROM users WHERE 1 = 1",
    );
    if user.is_manager() {
        builder
            .push(" AND (manager_id = ")
            .push_bind(user.id)
            .push(" OR id = ")
            .push_bind(user.id)
            .push(")");
    }
    if let Some(user_type) = user_type {
        builder.push(" AND user_type = ").push_bind(user_type.as_str());
    }
    builder.push(" ORDER BY name");

    let users = builder
        .build_query_as::<UserSummary>()
        .fetch_all(pool.get_ref())
        .await?;

    success_with(format!("{} users", users.len()), ListUsersResponse { users })
}

// Check if username is unique
pub async fn check_username(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<CheckUsernameRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin("check usernames")?;
    let username = request.username.trim();
    info!("Received request to check username: {}", username);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool.get_ref())
        .await?;

    let is_unique = count == 0;
    info!("Username {} is unique: {}", username, is_unique);
    success_with("Username checked", CheckUsernameResponse { is_unique })
}

// register user to DB
pub async fn create_user(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin("create users")?;

    let username = validate_username(&request.username)?;
    let name = required_text("name", &request.name)?;
    let user_type = request.user_type.parse::<UserType>().map_err(ApiError::BadRequest)?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string);
    info!("Received request to register user: {}", username);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(&username)
        .fetch_one(pool.get_ref())
        .await?;
    if count > 0 {
        return Err(ApiError::Conflict(format!("Username {} is already taken", username)));
    }

    // The manager's display name is denormalised next to manager_id.
    let manager_name = match request.manager_id {
        Some(manager_id) => {
            let name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = ?")
                .bind(manager_id)
                .fetch_optional(pool.get_ref())
                .await?;
            match name {
                Some(name) => Some(name),
                None => return Err(ApiError::BadRequest("Manager not found".into())),
            }
        }
        None => None,
    };

    // Encrypt password with bcrypt
    let hashed_password = hash(&request.password, DEFAULT_COST).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::Internal("Failed to hash password".into())
    })?;

    let result = sqlx::query(
        "INSERT INTO users (username, password, name, email, user_type, manager_id, manager, Status, department_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, 'Active', ?)",
    )
    .bind(&username)
    .bind(&hashed_password)
    .bind(&name)
    .bind(&email)
    .bind(user_type.as_str())
    .bind(request.manager_id)
    .bind(&manager_name)
    .bind(request.department_id)
    .execute(pool.get_ref())
    .await?;

    info!("User {} registered successfully", username);
    success_with(
        "User registered successfully",
        CreateUserResponse {
            user_id: result.last_insert_id(),
        },
    )
}

fn status_failure(status: StatusCode, message: String) -> HttpResponse {
    HttpResponse::build(status).json(UpdateUserStatusResponse {
        success: false,
        status: "error",
        message,
        account_status: None,
        cascaded: None,
    })
}

fn status_error(e: &ApiError) -> HttpResponse {
    match e {
        ApiError::Database(inner) => error!("Account status change failed: {}", inner),
        ApiError::Internal(message) => error!("{}", message),
        _ => {}
    }
    status_failure(e.status_code(), e.public_message())
}

fn rejected_form(e: &actix_web::Error) -> HttpResponse {
    status_failure(e.as_response_error().status_code(), e.to_string())
}

// Extractors are taken as Results so every failure keeps this endpoint's `success` field.
pub async fn update_user_status(
    pool: web::Data<MySqlPool>,
    user: Result<CurrentUser, ApiError>,
    request: Result<web::Form<UpdateUserStatusRequest>, actix_web::Error>,
) -> HttpResponse {
    let user = match user {
        Ok(user) => user,
        Err(e) => return status_error(&e),
    };
    let request = match request {
        Ok(request) => request.into_inner(),
        Err(e) => return rejected_form(&e),
    };

    match apply_user_status(pool.get_ref(), &user, &request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => status_error(&e),
    }
}

async fn apply_user_status(
    pool: &MySqlPool,
    user: &CurrentUser,
    request: &UpdateUserStatusRequest,
) -> Result<UpdateUserStatusResponse, ApiError> {
    user.require_admin("change account status")?;
    let new_status = request.status.parse::<AccountStatus>().map_err(ApiError::BadRequest)?;
    validate_status_change(user.id, request.user_id, new_status)?;

    let target: Option<(String, String)> =
        sqlx::query_as("SELECT username, user_type FROM users WHERE id = ?")
            .bind(request.user_id)
            .fetch_optional(pool)
            .await?;
    let (target_username, target_type) =
        target.ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    // Start a transaction
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE users SET Status = ? WHERE id = ?")
        .bind(new_status.as_str())
        .bind(request.user_id)
        .execute(&mut *tx)
        .await?;

    let cascaded = if cascades_to_client_users(&target_type) {
        sqlx::query("UPDATE users SET Status = ? WHERE manager_id = ? AND user_type = 'client'")
            .bind(new_status.as_str())
            .bind(request.user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
    } else {
        0
    };

    tx.commit().await?;

    info!(
        "User {} set to {} by {} ({} client users cascaded)",
        target_username,
        new_status.as_str(),
        user.username,
        cascaded
    );

    let draft = NotificationDraft::new(
        request.user_id,
        NotificationType::AccountStatus,
        "Account status changed",
        format!("Your account is now {}", new_status.as_str()),
    );
    notify::push_logged(pool, &draft).await;

    Ok(UpdateUserStatusResponse {
        success: true,
        status: "success",
        message: format!("User {} is now {}", target_username, new_status.as_str()),
        account_status: Some(new_status.as_str().to_string()),
        cascaded: Some(cascaded),
    })
}

pub async fn change_password(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    if request.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "new_password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let stored: String = sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
        .bind(user.id)
        .fetch_one(pool.get_ref())
        .await?;

    let valid = verify(&request.current_password, &stored).map_err(|e| {
        error!("Error when checking password for user {}: {}", user.username, e);
        ApiError::Internal("Error when checking password".into())
    })?;
    if !valid {
        return Err(ApiError::BadRequest("Current password is incorrect".into()));
    }

    let hashed_password = hash(&request.new_password, DEFAULT_COST).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::Internal("Failed to hash password".into())
    })?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed_password)
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    info!("User {} changed their password", user.username);
    Ok(success("Password changed successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_client_accounts_cascade() {
        assert!(cascades_to_client_users("client"));
        assert!(cascades_to_client_users("Client"));
        assert!(!cascades_to_client_users("manager"));
        assert!(!cascades_to_client_users("doer"));
    }

    #[test]
    fn admins_cannot_lock_themselves_out() {
        assert!(validate_status_change(1, 1, AccountStatus::Inactive).is_err());
        assert!(validate_status_change(1, 1, AccountStatus::Active).is_ok());
        assert!(validate_status_change(1, 2, AccountStatus::Inactive).is_ok());
    }

    #[test]
    fn usernames_are_trimmed_and_must_be_one_word() {
        assert_eq!(validate_username("  asha ").unwrap(), "asha");
        assert!(validate_username("asha k").is_err());
        assert!(validate_username("   ").is_err());
    }

    #[actix_web::test]
    async fn rejected_status_forms_keep_the_success_field() {
        let err: actix_web::Error = ApiError::BadRequest("Missing or invalid parameters: missing field `status`".into()).into();
        let response = rejected_form(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], "error");
        assert!(json["message"].as_str().unwrap().contains("status"));
        assert!(json.get("account_status").is_none());
    }
}
