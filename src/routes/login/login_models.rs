use serde::{Deserialize, Serialize};

// Login request and response
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub remember_me: Option<String>,
}

#[derive(Serialize)]
pub struct SessionUserInfo {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub user_type: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: SessionUserInfo,
}


// Auto-login response
#[derive(Serialize)]
pub struct AutoLoginResponse {
    pub user: SessionUserInfo,
}
