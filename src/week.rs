use chrono::{Datelike, Duration, NaiveDate};

/// Monday of the week containing `date`, clamped to the earliest representable date.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_signed(Duration::days(i64::from(date.weekday().num_days_from_monday())))
        .unwrap_or(NaiveDate::MIN)
}

/// Sunday of the week containing `date`, clamped to the latest representable date.
pub fn week_end(date: NaiveDate) -> NaiveDate {
    date.checked_add_signed(Duration::days(i64::from(6 - date.weekday().num_days_from_monday())))
        .unwrap_or(NaiveDate::MAX)
}

pub fn same_week(a: NaiveDate, b: NaiveDate) -> bool {
    week_start(a) <= b && b <= week_end(a)
}

/// How a reschedule is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftPlan {
    /// Planned date moves within the Monday–Sunday week: update the row in place.
    SameWeek,
    /// Planned date leaves the week: close the row as shifted and open a new one.
    NewWeek,
}

impl ShiftPlan {
    pub fn for_dates(original: NaiveDate, new_date: NaiveDate) -> Self {
        if same_week(original, new_date) {
            ShiftPlan::SameWeek
        } else {
            ShiftPlan::NewWeek
        }
    }

    pub fn counter_increment(self) -> i32 {
        match self {
            ShiftPlan::SameWeek => 1,
            ShiftPlan::NewWeek => 2,
        }
    }
}
