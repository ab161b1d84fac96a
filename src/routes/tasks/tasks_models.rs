use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::task::Task;
use crate::routes::form::empty_as_none;

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub doer_id: i32,
    pub description: String,
    pub planned_date: String,
    pub planned_time: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub department_id: Option<i32>,
}

#[derive(Serialize)]
pub struct CreateTaskResponse {
    pub task_id: i32,
    pub unique_id: String,
}


#[derive(Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub doer_id: Option<i32>,
}

#[derive(Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
}


#[derive(Debug, Default, Serialize, FromRow)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub delayed: i64,
    pub shifted: i64,
}

#[derive(Serialize)]
pub struct TaskSummaryResponse {
    pub delegation: StatusCounts,
    pub checklist: StatusCounts,
}


#[derive(Deserialize)]
pub struct EditTaskRequest {
    pub task_id: i32,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub doer_id: Option<i32>,
    pub planned_date: Option<String>,
    pub planned_time: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub duration_minutes: Option<i32>,
}


#[derive(Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub task_id: i32,
    pub new_status: String,
}


#[derive(Deserialize)]
pub struct ShiftTaskRequest {
    pub task_id: i32,
    pub new_planned_date: String,
    pub new_planned_time: Option<String>,
}

#[derive(Serialize)]
pub struct ShiftTaskResponse {
    /// Row that now carries the work: the same task, or the newly created one.
    pub task_id: i32,
    pub original_task_id: i32,
    pub shift_type: &'static str,
    pub shifted_count: i32,
}
