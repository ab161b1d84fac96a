//! Lateness bookkeeping for completed tasks.
//!
//! A delegation task is due at its planned date and time (end of day when no
//! time was given). A checklist task is always due at the end of its
//! `task_date`. Completing after the deadline marks the task delayed and
//! records how late it was as a formatted duration.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayFormat {
    /// `HH:MM:SS`, hours keep counting past 24.
    Hms,
    /// `HH:MM:SS` under a day, `N day(s) HH:MM:SS` beyond.
    DaysHms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delay {
    pub is_delayed: bool,
    pub duration: Option<String>,
}

impl Delay {
    pub fn none() -> Self {
        Delay {
            is_delayed: false,
            duration: None,
        }
    }
}

/// Wall-clock time of the server, the reference for every deadline comparison.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn end_of_day() -> NaiveTime {
    NaiveTime::MIN + Duration::seconds(SECONDS_PER_DAY - 1)
}

pub fn checklist_deadline(task_date: NaiveDate) -> NaiveDateTime {
    task_date.and_time(end_of_day())
}

pub fn delegation_deadline(planned_date: NaiveDate, planned_time: Option<NaiveTime>) -> NaiveDateTime {
    planned_date.and_time(planned_time.unwrap_or_else(end_of_day))
}

pub fn compute_delay(planned: NaiveDateTime, actual: NaiveDateTime, format: DelayFormat) -> Delay {
    if actual <= planned {
        return Delay::none();
    }

    let seconds = (actual - planned).num_seconds();
    Delay {
        is_delayed: true,
        duration: Some(match format {
            DelayFormat::Hms => format_hms(seconds),
            DelayFormat::DaysHms => format_days_hms(seconds),
        }),
    }
}

pub fn format_hms(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn format_days_hms(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let days = total_seconds / SECONDS_PER_DAY;
    let rest = format_hms(total_seconds % SECONDS_PER_DAY);
    match days {
        0 => rest,
        1 => format!("1 day {}", rest),
        n => format!("{} days {}", n, rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn checklist_deadline_is_end_of_task_date() {
        assert_eq!(checklist_deadline(day("2024-03-05")), at("2024-03-05", "23:59:59"));
    }

    #[test]
    fn checklist_completed_on_the_day_is_not_delayed() {
        let delay = compute_delay(
            checklist_deadline(day("2024-03-05")),
            at("2024-03-05", "23:59:59"),
            DelayFormat::Hms,
        );
        assert_eq!(delay, Delay::none());
    }

    #[test]
    fn checklist_completed_next_morning_reports_hours() {
        let delay = compute_delay(
            checklist_deadline(day("2024-03-05")),
            at("2024-03-06", "10:15:30"),
            DelayFormat::Hms,
        );
        assert!(delay.is_delayed);
        assert_eq!(delay.duration.as_deref(), Some("10:15:31"));
    }

    #[test]
    fn hms_keeps_counting_past_a_day() {
        let delay = compute_delay(
            checklist_deadline(day("2024-03-05")),
            at("2024-03-08", "00:00:00"),
            DelayFormat::Hms,
        );
        assert_eq!(delay.duration.as_deref(), Some("48:00:01"));
    }

    #[test]
    fn delegation_without_time_uses_end_of_day() {
        assert_eq!(
            delegation_deadline(day("2024-01-31"), None),
            at("2024-01-31", "23:59:59")
        );
    }

    #[test]
    fn delegation_delay_is_days_aware() {
        let planned = delegation_deadline(day("2024-01-01"), NaiveTime::from_hms_opt(9, 0, 0));
        let one_day = compute_delay(planned, at("2024-01-02", "11:30:00"), DelayFormat::DaysHms);
        assert_eq!(one_day.duration.as_deref(), Some("1 day 02:30:00"));

        let three_days = compute_delay(planned, at("2024-01-04", "09:00:05"), DelayFormat::DaysHms);
        assert_eq!(three_days.duration.as_deref(), Some("3 days 00:00:05"));

        let same_day = compute_delay(planned, at("2024-01-01", "09:45:00"), DelayFormat::DaysHms);
        assert_eq!(same_day.duration.as_deref(), Some("00:45:00"));
    }

    #[test]
    fn early_completion_has_no_duration() {
        let planned = delegation_deadline(day("2024-01-10"), NaiveTime::from_hms_opt(17, 0, 0));
        let delay = compute_delay(planned, at("2024-01-09", "12:00:00"), DelayFormat::DaysHms);
        assert!(!delay.is_delayed);
        assert!(delay.duration.is_none());
    }
}
