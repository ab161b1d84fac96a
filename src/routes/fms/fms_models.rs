use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::fms::{FmsSheet, FmsTask};
use crate::routes::form::empty_as_none;

#[derive(Deserialize)]
pub struct RegisterSheetRequest {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub label: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterSheetResponse {
    pub fms_sheet_id: u64,
}

#[derive(Serialize)]
pub struct ListSheetsResponse {
    pub sheets: Vec<FmsSheet>,
}


#[derive(Deserialize)]
pub struct SyncSheetRequest {
    pub fms_sheet_id: i32,
}

#[derive(Serialize)]
pub struct SyncSheetResponse {
    pub fms_sheet_id: i32,
    pub rows_imported: usize,
    pub synced_at: NaiveDateTime,
}


#[derive(Deserialize)]
pub struct ListFmsTasksQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub fms_sheet_id: Option<i32>,
    pub doer_name: Option<String>,
}

#[derive(Serialize)]
pub struct FmsTaskView {
    pub id: i32,
    pub fms_sheet_id: i32,
    pub sheet_row: i32,
    pub task_key: Option<String>,
    pub step_name: Option<String>,
    pub doer_name: Option<String>,
    pub planned: Option<String>,
    pub actual: Option<String>,
    pub status: Option<String>,
    pub payload: Value,
    pub imported_at: NaiveDateTime,
}

impl From<FmsTask> for FmsTaskView {
    fn from(row: FmsTask) -> Self {
        let payload = serde_json::from_str(&row.payload).unwrap_or(Value::String(row.payload));
        FmsTaskView {
            id: row.id,
            fms_sheet_id: row.fms_sheet_id,
            sheet_row: row.sheet_row,
            task_key: row.task_key,
            step_name: row.step_name,
            doer_name: row.doer_name,
            planned: row.planned,
            actual: row.actual,
            status: row.status,
            payload,
            imported_at: row.imported_at,
        }
    }
}

#[derive(Serialize)]
pub struct ListFmsTasksResponse {
    pub tasks: Vec<FmsTaskView>,
}
