use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Manager,
    Doer,
    Client,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::Manager => "manager",
            UserType::Doer => "doer",
            UserType::Client => "client",
        }
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserType::Admin),
            "manager" => Ok(UserType::Manager),
            "doer" => Ok(UserType::Doer),
            "client" => Ok(UserType::Client),
            other => Err(format!("Unknown user type: {}", other)),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Inactive => "Inactive",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("Unknown account status: {}", other)),
        }
    }
}

// Row as stored in `users`; `password` is a bcrypt hash and never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: Option<String>,
    pub user_type: String,
    pub manager_id: Option<i32>,
    pub manager: Option<String>,
    #[sqlx(rename = "Status")]
    pub status: String,
    pub department_id: Option<i32>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status.parse::<AccountStatus>() == Ok(AccountStatus::Active)
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub user_type: String,
    pub manager_id: Option<i32>,
    pub manager: Option<String>,
    #[sqlx(rename = "Status")]
    pub status: String,
    pub department_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_type_parses_case_insensitively() {
        assert_eq!("Admin".parse::<UserType>(), Ok(UserType::Admin));
        assert_eq!(" doer ".parse::<UserType>(), Ok(UserType::Doer));
        assert!("superuser".parse::<UserType>().is_err());
    }

    #[test]
    fn account_status_round_trips_through_the_column_spelling() {
        assert_eq!("active".parse::<AccountStatus>(), Ok(AccountStatus::Active));
        assert_eq!(AccountStatus::Inactive.as_str(), "Inactive");
    }
}
