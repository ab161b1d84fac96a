use serde::{Deserialize, Serialize};

use crate::models::checklist::ChecklistSubtask;
use crate::routes::form::empty_as_none;

#[derive(Deserialize)]
pub struct CreateChecklistRequest {
    pub assignee: String,
    pub description: String,
    pub frequency: String,
    pub start_date: String,
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub department_id: Option<i32>,
    pub skip_sundays: Option<String>,
}

#[derive(Serialize)]
pub struct CreateChecklistResponse {
    pub checklist_code: String,
    pub created: usize,
    pub first_date: String,
    pub last_date: String,
}


#[derive(Deserialize)]
pub struct ListChecklistQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub assignee: Option<String>,
}

#[derive(Serialize)]
pub struct ListChecklistResponse {
    pub tasks: Vec<ChecklistSubtask>,
}


#[derive(Deserialize)]
pub struct UpdateChecklistStatusRequest {
    pub task_id: i32,
    pub new_status: String,
}
