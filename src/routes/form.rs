use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

// HTML forms post empty strings for untouched optional inputs.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

pub fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("on") | Some("yes")
    )
}

// MySQL DATE range.
const EARLIEST_DATE: (i32, u32, u32) = (1000, 1, 1);
const LATEST_DATE: (i32, u32, u32) = (9999, 12, 31);

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{} must be a date formatted YYYY-MM-DD", field)))?;
    let ymd = (date.year(), date.month(), date.day());
    if ymd < EARLIEST_DATE || ymd > LATEST_DATE {
        return Err(ApiError::BadRequest(format!(
            "{} must be between 1000-01-01 and 9999-12-31",
            field
        )));
    }
    Ok(date)
}

pub fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ApiError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ApiError::BadRequest(format!("{} must be a time formatted HH:MM", field)))
}

pub fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, ApiError> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a date and time formatted YYYY-MM-DD HH:MM", field)))
}

pub fn optional<T>(
    field: &str,
    value: Option<&str>,
    parse: fn(&str, &str) -> Result<T, ApiError>,
) -> Result<Option<T>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse(field, raw).map(Some),
    }
}

pub fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ApiError::BadRequest(format!("{} is required", field)))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "empty_as_none")]
        manager_id: Option<i32>,
    }

    #[test]
    fn empty_optional_numbers_become_none() {
        let sample: Sample = serde_urlencoded::from_str("manager_id=").unwrap();
        assert_eq!(sample.manager_id, None);
        let sample: Sample = serde_urlencoded::from_str("").unwrap();
        assert_eq!(sample.manager_id, None);
        let sample: Sample = serde_urlencoded::from_str("manager_id=12").unwrap();
        assert_eq!(sample.manager_id, Some(12));
        assert!(serde_urlencoded::from_str::<Sample>("manager_id=abc").is_err());
    }

    #[test]
    fn checkbox_values_are_truthy() {
        assert!(is_truthy(Some("on")));
        assert!(is_truthy(Some("TRUE")));
        assert!(!is_truthy(Some("off")));
        assert!(!is_truthy(None));
    }

    #[test]
    fn times_accept_minutes_or_seconds() {
        assert_eq!(parse_time("t", "09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time("t", "09:30:15").unwrap(), NaiveTime::from_hms_opt(9, 30, 15).unwrap());
        assert!(parse_time("t", "9.30").is_err());
    }

    #[test]
    fn datetimes_accept_the_html_input_format() {
        let parsed = parse_datetime("proposed_at", "2024-06-01T14:00").unwrap();
        assert_eq!(parsed.to_string(), "2024-06-01 14:00:00");
        assert!(parse_datetime("proposed_at", "tomorrow").is_err());
    }

    #[test]
    fn blank_optional_fields_are_skipped() {
        assert_eq!(optional("planned_time", Some("  "), parse_time).unwrap(), None);
        assert!(optional("planned_date", Some("2024-13-01"), parse_date).is_err());
    }

    #[test]
    fn dates_outside_the_database_range_are_rejected() {
        for raw in ["-262143-01-01", "0999-12-31", "+262142-12-31", "+10000-01-01"] {
            match parse_date("new_planned_date", raw) {
                Err(ApiError::BadRequest(message)) => assert!(message.contains("new_planned_date"), "{}", raw),
                other => panic!("{} parsed as {:?}", raw, other),
            }
        }
        assert_eq!(parse_date("d", "1000-01-01").unwrap().to_string(), "1000-01-01");
        assert_eq!(parse_date("d", "9999-12-31").unwrap().to_string(), "9999-12-31");
    }
}
