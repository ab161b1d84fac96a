use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "shifted")]
    Shifted,
    #[serde(rename = "not done")]
    NotDone,
    #[serde(rename = "can not be done")]
    CanNotBeDone,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Shifted => "shifted",
            TaskStatus::NotDone => "not done",
            TaskStatus::CanNotBeDone => "can not be done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            "shifted" => Ok(TaskStatus::Shifted),
            "not done" => Ok(TaskStatus::NotDone),
            "can not be done" | "cannot be done" => Ok(TaskStatus::CanNotBeDone),
            _ => Err(format!("Unknown task status: {}", s.trim())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Delegation,
    Checklist,
    Fms,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Delegation => "delegation",
            TaskKind::Checklist => "checklist",
            TaskKind::Fms => "fms",
        }
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "delegation" | "task" => Ok(TaskKind::Delegation),
            "checklist" => Ok(TaskKind::Checklist),
            "fms" => Ok(TaskKind::Fms),
            other => Err(format!("Unknown task type: {}", other)),
        }
    }
}

// A row of `tasks`. `doer_name` is only present on listing queries.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Task {
    pub id: i32,
    pub unique_id: String,
    pub description: String,
    pub doer_id: i32,
    #[sqlx(default)]
    pub doer_name: Option<String>,
    pub assigned_by: Option<i32>,
    pub department_id: Option<i32>,
    pub planned_date: NaiveDate,
    pub planned_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub status: String,
    pub actual_date: Option<NaiveDate>,
    pub actual_time: Option<NaiveTime>,
    pub is_delayed: bool,
    pub delay_duration: Option<String>,
    pub shifted_count: i32,
    pub original_task_id: Option<i32>,
}

pub const TASK_COLUMNS: &str = "t.id, t.unique_id, t.description, t.doer_id, t.assigned_by, \
     t.department_id, t.planned_date, t.planned_time, t.duration_minutes, t.status, \
     t.actual_date, t.actual_time, t.is_delayed, t.delay_duration, t.shifted_count, \
     t.original_task_id";
