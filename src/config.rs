use std::env;
use std::str::FromStr;

pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub max_connections: u32,
    pub session_ttl_minutes: i64,
    pub remember_me_days: i64,
    pub run_migrations: bool,
    /// Seconds between overdue-task sweeps. 0 disables the background loop.
    pub reminder_interval_secs: u64,
    pub sheets_api_key: Option<String>,
    pub sheets_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = read("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Config {
            database_url,
            server_address: read("SERVER_ADDRESS")
                .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string()),
            max_connections: parse_or("DB_MAX_CONNECTIONS", read("DB_MAX_CONNECTIONS"), 5)?,
            session_ttl_minutes: parse_or("SESSION_TTL_MINUTES", read("SESSION_TTL_MINUTES"), 30)?,
            remember_me_days: parse_or("REMEMBER_ME_DAYS", read("REMEMBER_ME_DAYS"), 10)?,
            run_migrations: parse_flag("RUN_MIGRATIONS", read("RUN_MIGRATIONS"))?,
            reminder_interval_secs: parse_or(
                "REMINDER_INTERVAL_SECS",
                read("REMINDER_INTERVAL_SECS"),
                0,
            )?,
            sheets_api_key: read("GOOGLE_SHEETS_API_KEY"),
            sheets_base_url: read("GOOGLE_SHEETS_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SHEETS_BASE_URL.to_string()),
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_flag(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let normalized = raw.as_deref().map(str::to_lowercase);
    match normalized.as_deref() {
        None => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            name,
            value: raw.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = config_from(&[("DATABASE_URL", "mysql://root@localhost/tasks")]).unwrap();
        assert_eq!(config.server_address, DEFAULT_SERVER_ADDRESS);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.session_ttl_minutes, 30);
        assert_eq!(config.remember_me_days, 10);
        assert!(!config.run_migrations);
        assert_eq!(config.reminder_interval_secs, 0);
        assert!(config.sheets_api_key.is_none());
        assert_eq!(config.sheets_base_url, DEFAULT_SHEETS_BASE_URL);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = config_from(&[("SERVER_ADDRESS", "127.0.0.1:9000")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "mysql://localhost/tasks"),
            ("DB_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn flags_and_overrides_are_read() {
        let config = config_from(&[
            ("DATABASE_URL", "mysql://localhost/tasks"),
            ("RUN_MIGRATIONS", "TRUE"),
            ("REMINDER_INTERVAL_SECS", "600"),
            ("GOOGLE_SHEETS_API_KEY", " abc "),
            ("GOOGLE_SHEETS_BASE_URL", "http://localhost:9999/v4/"),
        ])
        .unwrap();
        assert!(config.run_migrations);
        assert_eq!(config.reminder_interval_secs, 600);
        assert_eq!(config.sheets_api_key.as_deref(), Some("abc"));
        assert_eq!(config.sheets_base_url, "http://localhost:9999/v4");
    }

    #[test]
    fn garbage_flag_is_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "mysql://localhost/tasks"),
            ("RUN_MIGRATIONS", "maybe"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RUN_MIGRATIONS", .. }));
    }
}
