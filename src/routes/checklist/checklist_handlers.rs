use actix_web::{web, HttpResponse};
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use log::{error, info};
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};
use uuid::Uuid;

use super::checklist_models::{
    CreateChecklistRequest, CreateChecklistResponse, ListChecklistQuery, ListChecklistResponse,
    UpdateChecklistStatusRequest,
};
use crate::auth::CurrentUser;
use crate::delay;
use crate::error::ApiError;
use crate::models::checklist::{ChecklistSubtask, Frequency, CHECKLIST_COLUMNS};
use crate::models::notification::NotificationType;
use crate::models::task::{TaskKind, TaskStatus};
use crate::notify::{self, NotificationDraft};
use crate::response::success_with;
use crate::routes::form::{is_truthy, optional, parse_date, required_text};
use crate::routes::tasks::tasks_handlers::fetch_assignee_by_username;
use crate::scope;
use crate::status::{self, StatusChange};

pub const MAX_OCCURRENCES: usize = 366;
const LIST_LIMIT: i64 = 500;

/// Dates a checklist series falls on, from `start` through `end` inclusive.
pub fn occurrences(
    frequency: Frequency,
    start: NaiveDate,
    end: NaiveDate,
    skip_sundays: bool,
) -> Result<Vec<NaiveDate>, ApiError> {
    if end < start {
        return Err(ApiError::BadRequest("end_date cannot be before start_date".into()));
    }

    let mut dates = Vec::new();
    match frequency {
        Frequency::Once => dates.push(start),
        Frequency::Daily | Frequency::Weekly => {
            let step = if frequency == Frequency::Daily { 1 } else { 7 };
            let mut date = start;
            while date <= end {
                if !(skip_sundays && frequency == Frequency::Daily && date.weekday() == Weekday::Sun) {
                    dates.push(date);
                }
                if dates.len() > MAX_OCCURRENCES {
                    break;
                }
                match date.checked_add_signed(Duration::days(step)) {
                    Some(next) => date = next,
                    None => break,
                }
            }
        }
        Frequency::Monthly => {
            // Offsets from the start date so a 31st stays a 31st where the month allows it.
            let mut offset = 0;
            while let Some(date) = start.checked_add_months(Months::new(offset)) {
                if date > end || dates.len() > MAX_OCCURRENCES {
                    break;
                }
                dates.push(date);
                offset += 1;
            }
        }
    }

    if dates.len() > MAX_OCCURRENCES {
        return Err(ApiError::BadRequest(format!(
            "A checklist series cannot have more than {} dates",
            MAX_OCCURRENCES
        )));
    }
    if dates.is_empty() {
        return Err(ApiError::BadRequest("The date range contains no checklist dates".into()));
    }
    Ok(dates)
}

// Handler to create a checklist series
pub async fn create_checklist(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<CreateChecklistRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_staff("assign checklists")?;

    let description = required_text("description", &request.description)?;
    let frequency = request.frequency.parse::<Frequency>().map_err(ApiError::BadRequest)?;
    let start = parse_date("start_date", &request.start_date)?;
    let end = match optional("end_date", request.end_date.as_deref(), parse_date)? {
        Some(end) => end,
        None if frequency == Frequency::Once => start,
        None => return Err(ApiError::BadRequest("end_date is required for recurring checklists".into())),
    };
    let dates = occurrences(frequency, start, end, is_truthy(request.skip_sundays.as_deref()))?;

    let assignee = fetch_assignee_by_username(pool.get_ref(), request.assignee.trim()).await?;
    let checklist_code = Uuid::new_v4().to_string();
    let department_id = request.department_id.or(user.department_id);

    // Start a transaction
    let mut tx = pool.begin().await?;
    let inserted = insert_series(
        &mut tx,
        &checklist_code,
        &description,
        &assignee.username,
        user.id,
        department_id,
        frequency,
        &dates,
    )
    .await;

    if let Err(e) = inserted {
        if let Err(rollback_err) = tx.rollback().await {
            error!("Failed to roll back checklist {}: {}", checklist_code, rollback_err);
        }
        return Err(ApiError::Database(e));
    }
    tx.commit().await?;

    info!(
        "Checklist {} ({} x {}) assigned to {} by {}",
        checklist_code,
        dates.len(),
        frequency.as_str(),
        assignee.username,
        user.username
    );

    let first_date = dates[0];
    let last_date = dates[dates.len() - 1];
    let draft = NotificationDraft::new(
        assignee.id,
        NotificationType::ChecklistAssigned,
        "New checklist assigned",
        format!(
            "{} assigned you \"{}\" ({}, {} to {})",
            user.name,
            description,
            frequency.as_str(),
            first_date,
            last_date
        ),
    );
    notify::push_logged(pool.get_ref(), &draft).await;

    success_with(
        "Checklist created successfully",
        CreateChecklistResponse {
            checklist_code,
            created: dates.len(),
            first_date: first_date.to_string(),
            last_date: last_date.to_string(),
        },
    )
}

#[allow(clippy::too_many_arguments)]
async fn insert_series(
    tx: &mut Transaction<'_, MySql>,
    checklist_code: &str,
    description: &str,
    assignee: &str,
    assigned_by: i32,
    department_id: Option<i32>,
    frequency: Frequency,
    dates: &[NaiveDate],
) -> Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::<MySql>::new(
        "INSERT INTO checklist_subtasks
            (checklist_code, description, assignee, assigned_by, department_id, frequency, task_date, status, is_delayed) ",
    );
    builder.push_values(dates, |mut row, date| {
        row.push_bind(checklist_code)
            .push_bind(description)
            .push_bind(assignee)
            .push_bind(assigned_by)
            .push_bind(department_id)
            .push_bind(frequency.as_str())
            .push_bind(*date)
            .push_bind("pending")
            .push_bind(false);
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

// Handler to get the checklist rows visible to the caller
pub async fn list_checklist(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    query: web::Query<ListChecklistQuery>,
) -> Result<HttpResponse, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<TaskStatus>().map_err(ApiError::BadRequest)?),
    };
    let from = optional("from", query.from.as_deref(), parse_date)?;
    let to = optional("to", query.to.as_deref(), parse_date)?;
    let assignee = query
        .assignee
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let mut builder = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM checklist_subtasks c WHERE 1 = 1",
        CHECKLIST_COLUMNS
    ));
    scope::push_checklist_scope(&mut builder, &user)?;
    if let Some(status) = status {
        builder.push(" AND c.status = ").push_bind(status.as_str());
    }
    if let Some(from) = from {
        builder.push(" AND c.task_date >= ").push_bind(from);
    }
    if let Some(to) = to {
        builder.push(" AND c.task_date <= ").push_bind(to);
    }
    if let Some(assignee) = assignee {
        builder.push(" AND c.assignee = ").push_bind(assignee.to_string());
    }
    builder
        .push(" ORDER BY c.task_date DESC, c.id DESC LIMIT ")
        .push_bind(LIST_LIMIT);

    let tasks = builder
        .build_query_as::<ChecklistSubtask>()
        .fetch_all(pool.get_ref())
        .await?;

    success_with(format!("{} checklist tasks", tasks.len()), ListChecklistResponse { tasks })
}

// Handler for the checklist status endpoint
pub async fn update_checklist_status(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<UpdateChecklistStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let new_status = request.new_status.parse::<TaskStatus>().map_err(ApiError::BadRequest)?;
    let change = StatusChange {
        task_id: request.task_id,
        kind: TaskKind::Checklist,
        new_status,
    };
    let outcome = status::apply(pool.get_ref(), &user, change, delay::now()).await?;
    success_with(outcome.message(), outcome)
}
