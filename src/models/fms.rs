use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FmsSheet {
    pub id: i32,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub label: Option<String>,
    pub created_by: Option<i32>,
    pub last_synced_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FmsTask {
    pub id: i32,
    pub fms_sheet_id: i32,
    pub sheet_row: i32,
    pub task_key: Option<String>,
    pub step_name: Option<String>,
    pub doer_name: Option<String>,
    pub planned: Option<String>,
    pub actual: Option<String>,
    pub status: Option<String>,
    pub payload: String,
    pub imported_at: NaiveDateTime,
}
