//! Google Sheets import for FMS tasks.
//!
//! Only the read side of the Sheets v4 REST API is used: one `values.get`
//! call per sync, authenticated with an API key.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("GOOGLE_SHEETS_API_KEY is not configured")]
    MissingApiKey,

    #[error("Sheets request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Sheets API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl From<SheetsError> for ApiError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::MissingApiKey => ApiError::BadRequest(
                "Sheet sync is disabled: no Google Sheets API key is configured".into(),
            ),
            SheetsError::Api { status, .. } => {
                ApiError::Upstream(format!("Google Sheets answered with HTTP {}", status))
            }
            SheetsError::Request(_) => ApiError::Upstream("Google Sheets could not be reached".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SheetsClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, SheetsError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn values_url(&self, spreadsheet_id: &str, sheet_name: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(sheet_name)
        )
    }

    /// Every populated row of the sheet, cells rendered as text.
    pub async fn fetch_values(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let api_key = self.api_key.as_deref().ok_or(SheetsError::MissingApiKey)?;

        let response = self
            .client
            .get(self.values_url(spreadsheet_id, sheet_name))
            .query(&[("key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let range: ValueRange = response.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A data row mapped onto the `fms_tasks` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmsRow {
    /// 1-based row number in the sheet; the header is row 1.
    pub sheet_row: i32,
    pub task_key: Option<String>,
    pub step_name: Option<String>,
    pub doer_name: Option<String>,
    pub planned: Option<String>,
    pub actual: Option<String>,
    pub status: Option<String>,
    /// JSON object of header -> cell for the whole row.
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    TaskKey,
    StepName,
    DoerName,
    Planned,
    Actual,
    Status,
}

fn recognise(header: &str) -> Option<Column> {
    match header.trim().to_lowercase().as_str() {
        "task id" | "unique key" | "id" => Some(Column::TaskKey),
        "step" | "step name" => Some(Column::StepName),
        "doer" | "doer name" => Some(Column::DoerName),
        "planned" => Some(Column::Planned),
        "actual" => Some(Column::Actual),
        "status" => Some(Column::Status),
        _ => None,
    }
}

/// First row is the header. Blank rows are dropped.
pub fn rows_to_fms(values: &[Vec<String>]) -> Vec<FmsRow> {
    let Some((header, data)) = values.split_first() else {
        return Vec::new();
    };

    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let name = name.trim();
            if name.is_empty() {
                format!("column_{}", index + 1)
            } else {
                name.to_string()
            }
        })
        .collect();
    let columns: Vec<Option<Column>> = header.iter().map(|name| recognise(name)).collect();

    data.iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|(index, row)| {
            let mut fms = FmsRow {
                sheet_row: index as i32 + 2,
                task_key: None,
                step_name: None,
                doer_name: None,
                planned: None,
                actual: None,
                status: None,
                payload: String::new(),
            };
            let mut payload = BTreeMap::new();

            for (position, cell) in row.iter().enumerate() {
                let cell = cell.trim();
                let name = names
                    .get(position)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", position + 1));
                payload.insert(name, Value::String(cell.to_string()));

                if cell.is_empty() {
                    continue;
                }
                let slot = match columns.get(position).copied().flatten() {
                    Some(Column::TaskKey) => &mut fms.task_key,
                    Some(Column::StepName) => &mut fms.step_name,
                    Some(Column::DoerName) => &mut fms.doer_name,
                    Some(Column::Planned) => &mut fms.planned,
                    Some(Column::Actual) => &mut fms.actual,
                    Some(Column::Status) => &mut fms.status,
                    None => continue,
                };
                if slot.is_none() {
                    *slot = Some(cell.to_string());
                }
            }

            fms.payload = Value::Object(payload.into_iter().collect()).to_string();
            fms
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn known_headers_fill_columns() {
        let values = sheet(&[
            &["Task ID", "Step Name", "Doer", "Planned", "Actual", "Status", "Remarks"],
            &["PO-1", "Dispatch", "asha", "2024-05-01 10:00", "", "Pending", "urgent"],
        ]);
        let rows = rows_to_fms(&values);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.sheet_row, 2);
        assert_eq!(row.task_key.as_deref(), Some("PO-1"));
        assert_eq!(row.step_name.as_deref(), Some("Dispatch"));
        assert_eq!(row.doer_name.as_deref(), Some("asha"));
        assert_eq!(row.actual, None);
        let payload: Value = serde_json::from_str(&row.payload).unwrap();
        assert_eq!(payload["Remarks"], "urgent");
        assert_eq!(payload["Actual"], "");
    }

    #[test]
    fn blank_rows_are_skipped_but_keep_numbering() {
        let values = sheet(&[&["id", "doer"], &["", " "], &["7", "ravi"]]);
        let rows = rows_to_fms(&values);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sheet_row, 3);
        assert_eq!(rows[0].task_key.as_deref(), Some("7"));
    }

    #[test]
    fn cells_past_the_header_get_positional_names() {
        let values = sheet(&[&["Status", ""], &["Done", "x", "y"]]);
        let rows = rows_to_fms(&values);
        let payload: Value = serde_json::from_str(&rows[0].payload).unwrap();
        assert_eq!(payload["column_2"], "x");
        assert_eq!(payload["column_3"], "y");
        assert_eq!(rows[0].status.as_deref(), Some("Done"));
    }

    #[test]
    fn header_only_sheets_import_nothing() {
        assert!(rows_to_fms(&sheet(&[&["id"]])).is_empty());
        assert!(rows_to_fms(&[]).is_empty());
    }

    #[test]
    fn sheet_names_are_escaped_in_the_url() {
        let client = SheetsClient::new("https://sheets.test/v4/".into(), None).unwrap();
        assert_eq!(
            client.values_url("abc", "Orders 2024"),
            "https://sheets.test/v4/spreadsheets/abc/values/Orders%202024"
        );
        assert!(!client.is_configured());
    }

    #[test]
    fn missing_key_is_a_bad_request() {
        assert!(matches!(ApiError::from(SheetsError::MissingApiKey), ApiError::BadRequest(_)));
        let api = SheetsError::Api {
            status: 403,
            body: "denied".into(),
        };
        assert!(matches!(ApiError::from(api), ApiError::Upstream(_)));
    }
}
