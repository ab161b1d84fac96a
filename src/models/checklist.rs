use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "once" | "one-time" | "onetime" => Ok(Frequency::Once),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!("Unknown frequency: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChecklistSubtask {
    pub id: i32,
    pub checklist_code: String,
    pub description: String,
    pub assignee: String,
    pub assigned_by: Option<i32>,
    pub department_id: Option<i32>,
    pub frequency: String,
    pub task_date: NaiveDate,
    pub status: String,
    pub actual_date: Option<NaiveDate>,
    pub actual_time: Option<NaiveTime>,
    pub is_delayed: bool,
    pub delay_duration: Option<String>,
}

pub const CHECKLIST_COLUMNS: &str = "c.id, c.checklist_code, c.description, c.assignee, \
     c.assigned_by, c.department_id, c.frequency, c.task_date, c.status, c.actual_date, \
     c.actual_time, c.is_delayed, c.delay_duration";
