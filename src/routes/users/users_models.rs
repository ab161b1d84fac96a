use serde::{Deserialize, Serialize};

use crate::models::user::UserSummary;
use crate::routes::form::empty_as_none;

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub user_type: Option<String>,
}

#[derive(Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserSummary>,
}


// Username check request and response
#[derive(Deserialize)]
pub struct CheckUsernameRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct CheckUsernameResponse {
    pub is_unique: bool,
}


#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: Option<String>,
    pub user_type: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub manager_id: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub department_id: Option<i32>,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub user_id: u64,
}


#[derive(Deserialize)]
pub struct UpdateUserStatusRequest {
    pub user_id: i32,
    pub status: String,
}

// This endpoint answers with `success` alongside `status`, unlike the rest of the API.
#[derive(Serialize)]
pub struct UpdateUserStatusResponse {
    pub success: bool,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascaded: Option<u64>,
}


#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}
