use actix_web::{web, HttpResponse};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};

use super::fms_models::{
    FmsTaskView, ListFmsTasksQuery, ListFmsTasksResponse, ListSheetsResponse, RegisterSheetRequest,
    RegisterSheetResponse, SyncSheetRequest, SyncSheetResponse,
};
use crate::auth::CurrentUser;
use crate::delay;
use crate::error::ApiError;
use crate::models::fms::{FmsSheet, FmsTask};
use crate::response::success_with;
use crate::routes::form::required_text;
use crate::sheets::{rows_to_fms, FmsRow, SheetsClient, SheetsError};

// Keeps each bulk INSERT well under MySQL's placeholder limit.
const INSERT_CHUNK: usize = 500;
const LIST_LIMIT: i64 = 1000;

const SHEET_COLUMNS: &str = "id, spreadsheet_id, sheet_name, label, created_by, last_synced_at";

// Handler to register a Google Sheet as an FMS source
pub async fn register_sheet(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<RegisterSheetRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin("register FMS sheets")?;

    let spreadsheet_id = required_text("spreadsheet_id", &request.spreadsheet_id)?;
    let sheet_name = required_text("sheet_name", &request.sheet_name)?;
    let label = request
        .label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty());

    let result = sqlx::query(
        "INSERT INTO fms_sheets (spreadsheet_id, sheet_name, label, created_by) VALUES (?, ?, ?, ?)",
    )
    .bind(&spreadsheet_id)
    .bind(&sheet_name)
    .bind(label)
    .bind(user.id)
    .execute(pool.get_ref())
    .await?;

    info!("FMS sheet {}/{} registered by {}", spreadsheet_id, sheet_name, user.username);
    success_with(
        "Sheet registered successfully",
        RegisterSheetResponse {
            fms_sheet_id: result.last_insert_id(),
        },
    )
}

pub async fn list_sheets(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    user.require_staff("view FMS sheets")?;

    let sheets = sqlx::query_as::<_, FmsSheet>(&format!(
        "SELECT {} FROM fms_sheets ORDER BY id",
        SHEET_COLUMNS
    ))
    .fetch_all(pool.get_ref())
    .await?;

    success_with(format!("{} sheets", sheets.len()), ListSheetsResponse { sheets })
}

// Handler to re-import every row of a sheet
pub async fn sync_sheet(
    pool: web::Data<MySqlPool>,
    sheets: web::Data<SheetsClient>,
    user: CurrentUser,
    request: web::Form<SyncSheetRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_staff("sync FMS sheets")?;

    // 1. Resolve the sheet
    let sheet = sqlx::query_as::<_, FmsSheet>(&format!(
        "SELECT {} FROM fms_sheets WHERE id = ?",
        SHEET_COLUMNS
    ))
    .bind(request.fms_sheet_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("FMS sheet not found".into()))?;

    if !sheets.is_configured() {
        return Err(SheetsError::MissingApiKey.into());
    }

    // 2. Fetch from Google
    let synced_at = delay::now();
    let values = match sheets.fetch_values(&sheet.spreadsheet_id, &sheet.sheet_name).await {
        Ok(values) => values,
        Err(e) => {
            error!("Sync of FMS sheet {} failed: {}", sheet.id, e);
            record_failed_sync(pool.get_ref(), sheet.id, synced_at, &e.to_string()).await;
            return Err(e.into());
        }
    };
    let rows = rows_to_fms(&values);

    // 3. Replace the imported rows
    let mut tx = pool.begin().await?;
    if let Err(e) = replace_rows(&mut tx, sheet.id, &rows, synced_at).await {
        if let Err(rollback_err) = tx.rollback().await {
            error!("Failed to roll back sync of FMS sheet {}: {}", sheet.id, rollback_err);
        }
        record_failed_sync(pool.get_ref(), sheet.id, synced_at, "rows could not be stored").await;
        return Err(ApiError::Database(e));
    }
    tx.commit().await?;

    info!(
        "FMS sheet {} synced by {}: {} rows",
        sheet.id,
        user.username,
        rows.len()
    );
    success_with(
        "Sheet synced successfully",
        SyncSheetResponse {
            fms_sheet_id: sheet.id,
            rows_imported: rows.len(),
            synced_at,
        },
    )
}

async fn replace_rows(
    tx: &mut Transaction<'_, MySql>,
    fms_sheet_id: i32,
    rows: &[FmsRow],
    synced_at: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM fms_tasks WHERE fms_sheet_id = ?")
        .bind(fms_sheet_id)
        .execute(&mut **tx)
        .await?;

    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut builder = QueryBuilder::<MySql>::new(
            "INSERT INTO fms_tasks
                (fms_sheet_id, sheet_row, task_key, step_name, doer_name, planned, actual, status, payload, imported_at) ",
        );
        builder.push_values(chunk, |mut row, fms| {
            row.push_bind(fms_sheet_id)
                .push_bind(fms.sheet_row)
                .push_bind(fms.task_key.as_deref())
                .push_bind(fms.step_name.as_deref())
                .push_bind(fms.doer_name.as_deref())
                .push_bind(fms.planned.as_deref())
                .push_bind(fms.actual.as_deref())
                .push_bind(fms.status.as_deref())
                .push_bind(fms.payload.as_str())
                .push_bind(synced_at);
        });
        builder.build().execute(&mut **tx).await?;
    }

    sqlx::query(
        "INSERT INTO fms_sheet_sync (fms_sheet_id, synced_at, rows_imported, outcome, error_message)
         VALUES (?, ?, ?, 'success', NULL)",
    )
    .bind(fms_sheet_id)
    .bind(synced_at)
    .bind(rows.len() as i32)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE fms_sheets SET last_synced_at = ? WHERE id = ?")
        .bind(synced_at)
        .bind(fms_sheet_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

async fn record_failed_sync(pool: &MySqlPool, fms_sheet_id: i32, synced_at: NaiveDateTime, reason: &str) {
    let result = sqlx::query(
        "INSERT INTO fms_sheet_sync (fms_sheet_id, synced_at, rows_imported, outcome, error_message)
         VALUES (?, ?, 0, 'failed', ?)",
    )
    .bind(fms_sheet_id)
    .bind(synced_at)
    .bind(reason)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!("Failed to record failed sync of FMS sheet {}: {}", fms_sheet_id, e);
    }
}

// Handler to get imported FMS rows
pub async fn list_fms_tasks(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    query: web::Query<ListFmsTasksQuery>,
) -> Result<HttpResponse, ApiError> {
    if user.is_client() {
        return Err(ApiError::Forbidden("Clients cannot view tasks".into()));
    }

    let mut builder = QueryBuilder::<MySql>::new(
        "SELECT id, fms_sheet_id, sheet_row, task_key, step_name, doer_name, planned, actual, status,
                payload, imported_at
         FROM fms_tasks WHERE 1 = 1",
    );
    if let Some(fms_sheet_id) = query.fms_sheet_id {
        builder.push(" AND fms_sheet_id = ").push_bind(fms_sheet_id);
    }

    // Sheets name doers free-hand, so matching ignores case.
    let doer_name = if user.is_doer() {
        Some(user.username.clone())
    } else {
        query
            .doer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    };
    if let Some(doer_name) = doer_name {
        builder
            .push(" AND LOWER(doer_name) = LOWER(")
            .push_bind(doer_name)
            .push(")");
    }
    builder
        .push(" ORDER BY fms_sheet_id, sheet_row LIMIT ")
        .push_bind(LIST_LIMIT);

    let tasks: Vec<FmsTaskView> = builder
        .build_query_as::<FmsTask>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(FmsTaskView::from)
        .collect();

    success_with(format!("{} FMS tasks", tasks.len()), ListFmsTasksResponse { tasks })
}
