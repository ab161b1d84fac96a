use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, NaiveTime};
use log::{error, info};
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};
use uuid::Uuid;

use super::tasks_models::{
    CreateTaskRequest, CreateTaskResponse, EditTaskRequest, ListTasksQuery, ListTasksResponse,
    ShiftTaskRequest, ShiftTaskResponse, StatusCounts, TaskSummaryResponse, UpdateTaskStatusRequest,
};
use crate::auth::CurrentUser;
use crate::delay::{self, Delay, DelayFormat};
use crate::error::{inserted_id, ApiError};
use crate::models::notification::NotificationType;
use crate::models::task::{Task, TaskKind, TaskStatus, TASK_COLUMNS};
use crate::models::user::{AccountStatus, UserType};
use crate::notify::{self, NotificationDraft};
use crate::response::success_with;
use crate::routes::form::{optional, parse_date, parse_time, required_text};
use crate::scope;
use crate::status::{self, StatusChange};
use crate::week::ShiftPlan;

const LIST_LIMIT: i64 = 500;

pub struct Assignee {
    pub id: i32,
    pub username: String,
}

/// Looks up a user that can receive work: exists, is active, is not a client.
pub async fn fetch_assignee_by_id(pool: &MySqlPool, user_id: i32) -> Result<Assignee, ApiError> {
    let row: Option<(i32, String, String, String)> =
        sqlx::query_as("SELECT id, username, user_type, Status FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    check_assignee(row)
}

pub async fn fetch_assignee_by_username(pool: &MySqlPool, username: &str) -> Result<Assignee, ApiError> {
    let row: Option<(i32, String, String, String)> =
        sqlx::query_as("SELECT id, username, user_type, Status FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;
    check_assignee(row)
}

fn check_assignee(row: Option<(i32, String, String, String)>) -> Result<Assignee, ApiError> {
    let (id, username, user_type, status) =
        row.ok_or_else(|| ApiError::BadRequest("Assignee not found".into()))?;
    if status.parse::<AccountStatus>() != Ok(AccountStatus::Active) {
        return Err(ApiError::BadRequest(format!("{} is inactive", username)));
    }
    if user_type.parse::<UserType>() == Ok(UserType::Client) {
        return Err(ApiError::BadRequest("Tasks cannot be assigned to client accounts".into()));
    }
    Ok(Assignee { id, username })
}

pub async fn fetch_task(pool: &MySqlPool, task_id: i32) -> Result<Task, ApiError> {
    sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks t WHERE t.id = ?", TASK_COLUMNS))
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))
}

/// Delay of an already completed task measured against a new deadline.
pub fn recompute_delay(task: &Task, deadline: chrono::NaiveDateTime) -> Delay {
    match (task.status.parse::<TaskStatus>(), task.actual_date) {
        (Ok(TaskStatus::Completed), Some(actual_date)) => {
            let actual = actual_date.and_time(task.actual_time.unwrap_or(NaiveTime::MIN));
            delay::compute_delay(deadline, actual, DelayFormat::DaysHms)
        }
        _ => Delay::none(),
    }
}

// Handler to create a delegation task
pub async fn create_task(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_staff("assign tasks")?;

    let description = required_text("description", &request.description)?;
    let planned_date = parse_date("planned_date", &request.planned_date)?;
    let planned_time = optional("planned_time", request.planned_time.as_deref(), parse_time)?;
    if matches!(request.duration_minutes, Some(minutes) if minutes <= 0) {
        return Err(ApiError::BadRequest("duration_minutes must be positive".into()));
    }

    let doer = fetch_assignee_by_id(pool.get_ref(), request.doer_id).await?;
    let unique_id = Uuid::new_v4().to_string();

    let result = sqlx::query(
        "INSERT INTO tasks
            (unique_id, description, doer_id, assigned_by, department_id, planned_date, planned_time,
             duration_minutes, status, is_delayed, shifted_count)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, 0)",
    )
    .bind(&unique_id)
    .bind(&description)
    .bind(doer.id)
    .bind(user.id)
    .bind(request.department_id.or(user.department_id))
    .bind(planned_date)
    .bind(planned_time)
    .bind(request.duration_minutes)
    .execute(pool.get_ref())
    .await?;

    let task_id = inserted_id(result.last_insert_id())?;
    info!("Task {} assigned to {} by {}", task_id, doer.username, user.username);

    let draft = NotificationDraft::new(
        doer.id,
        NotificationType::TaskAssigned,
        "New task assigned",
        format!("{} assigned you \"{}\" due {}", user.name, description, planned_date),
    )
    .related("delegation", task_id);
    notify::push_logged(pool.get_ref(), &draft).await;

    success_with("Task created successfully", CreateTaskResponse { task_id, unique_id })
}

// Handler to get the task list visible to the caller
pub async fn list_tasks(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    query: web::Query<ListTasksQuery>,
) -> Result<HttpResponse, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<TaskStatus>().map_err(ApiError::BadRequest)?),
    };
    let from = optional("from", query.from.as_deref(), parse_date)?;
    let to = optional("to", query.to.as_deref(), parse_date)?;

    let mut builder = QueryBuilder::<MySql>::new(format!(
        "SELECT {}, u.username AS doer_name FROM tasks t JOIN users u ON u.id = t.doer_id WHERE 1 = 1",
        TASK_COLUMNS
    ));
    scope::push_delegation_scope(&mut builder, &user)?;
    if let Some(status) = status {
        builder.push(" AND t.status = ").push_bind(status.as_str());
    }
    if let Some(from) = from {
        builder.push(" AND t.planned_date >= ").push_bind(from);
    }
    if let Some(to) = to {
        builder.push(" AND t.planned_date <= ").push_bind(to);
    }
    if let Some(doer_id) = query.doer_id {
        builder.push(" AND t.doer_id = ").push_bind(doer_id);
    }
    builder
        .push(" ORDER BY t.planned_date DESC, t.id DESC LIMIT ")
        .push_bind(LIST_LIMIT);

    let tasks = builder
        .build_query_as::<Task>()
        .fetch_all(pool.get_ref())
        .await?;

    success_with(format!("{} tasks", tasks.len()), ListTasksResponse { tasks })
}

// Handler to count delegation and checklist work in the caller's scope
pub async fn task_summary(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let mut delegation = QueryBuilder::<MySql>::new(
        "SELECT COUNT(*) AS total,
                CAST(COALESCE(SUM(t.status = 'pending'), 0) AS SIGNED) AS pending,
                CAST(COALESCE(SUM(t.status = 'completed'), 0) AS SIGNED) AS completed,
                CAST(COALESCE(SUM(t.status = 'completed' AND t.is_delayed = 1), 0) AS SIGNED) AS delayed,
                CAST(COALESCE(SUM(t.status = 'shifted'), 0) AS SIGNED) AS shifted
         FROM tasks t JOIN users u ON u.id = t.doer_id WHERE 1 = 1",
    );
    scope::push_delegation_scope(&mut delegation, &user)?;
    let delegation = delegation
        .build_query_as::<StatusCounts>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut checklist = QueryBuilder::<MySql>::new(
        "SELECT COUNT(*) AS total,
                CAST(COALESCE(SUM(c.status = 'pending'), 0) AS SIGNED) AS pending,
                CAST(COALESCE(SUM(c.status = 'completed'), 0) AS SIGNED) AS completed,
                CAST(COALESCE(SUM(c.status = 'completed' AND c.is_delayed = 1), 0) AS SIGNED) AS delayed,
                CAST(0 AS SIGNED) AS shifted
         FROM checklist_subtasks c WHERE 1 = 1",
    );
    scope::push_checklist_scope(&mut checklist, &user)?;
    let checklist = checklist
        .build_query_as::<StatusCounts>()
        .fetch_one(pool.get_ref())
        .await?;

    success_with("Task summary", TaskSummaryResponse { delegation, checklist })
}

// Handler for an admin to edit a delegation task
pub async fn edit_task(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<EditTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin("edit tasks")?;

    let task = fetch_task(pool.get_ref(), request.task_id).await?;
    if task.status.parse::<TaskStatus>() == Ok(TaskStatus::Shifted) {
        return Err(ApiError::BadRequest("Shifted tasks cannot be edited".into()));
    }

    let description = match request.description.as_deref() {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => task.description.clone(),
    };
    let planned_date = optional("planned_date", request.planned_date.as_deref(), parse_date)?
        .unwrap_or(task.planned_date);
    let planned_time = optional("planned_time", request.planned_time.as_deref(), parse_time)?
        .or(task.planned_time);
    let duration_minutes = request.duration_minutes.or(task.duration_minutes);

    let new_doer = match request.doer_id {
        Some(doer_id) if doer_id != task.doer_id => Some(fetch_assignee_by_id(pool.get_ref(), doer_id).await?),
        _ => None,
    };
    let doer_id = new_doer.as_ref().map(|doer| doer.id).unwrap_or(task.doer_id);

    let deadline_changed = planned_date != task.planned_date || planned_time != task.planned_time;
    let delay = if deadline_changed {
        recompute_delay(&task, delay::delegation_deadline(planned_date, planned_time))
    } else {
        Delay {
            is_delayed: task.is_delayed,
            duration: task.delay_duration.clone(),
        }
    };

    let affected = sqlx::query(
        "UPDATE tasks SET description = ?, doer_id = ?, planned_date = ?, planned_time = ?,
                duration_minutes = ?, is_delayed = ?, delay_duration = ?
         WHERE id = ? AND status = ?",
    )
    .bind(&description)
    .bind(doer_id)
    .bind(planned_date)
    .bind(planned_time)
    .bind(duration_minutes)
    .bind(delay.is_delayed)
    .bind(&delay.duration)
    .bind(task.id)
    .bind(&task.status)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::Conflict(
            "Task was not updated; it changed while you were editing it".into(),
        ));
    }
    info!("Task {} edited by {}", task.id, user.username);

    if let Some(doer) = new_doer {
        let draft = NotificationDraft::new(
            doer.id,
            NotificationType::TaskAssigned,
            "Task reassigned to you",
            format!("\"{}\" is now yours, due {}", description, planned_date),
        )
        .related("delegation", task.id);
        notify::push_logged(pool.get_ref(), &draft).await;
    }

    success_with("Task updated successfully", serde_json::json!({ "task_id": task.id }))
}

// Handler for the delegation status endpoint
pub async fn update_task_status(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<UpdateTaskStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let new_status = request.new_status.parse::<TaskStatus>().map_err(ApiError::BadRequest)?;
    let change = StatusChange {
        task_id: request.task_id,
        kind: TaskKind::Delegation,
        new_status,
    };
    let outcome = status::apply(pool.get_ref(), &user, change, delay::now()).await?;
    success_with(outcome.message(), outcome)
}

pub fn validate_shift(task: &Task, new_date: NaiveDate, new_time: Option<NaiveTime>) -> Result<ShiftPlan, ApiError> {
    match task.status.parse::<TaskStatus>() {
        Ok(TaskStatus::Completed) => {
            return Err(ApiError::BadRequest("Completed tasks cannot be shifted".into()))
        }
        Ok(TaskStatus::Shifted) => {
            return Err(ApiError::BadRequest(
                "This task was already shifted; shift the rescheduled task instead".into(),
            ))
        }
        _ => {}
    }
    if new_date == task.planned_date && new_time == task.planned_time {
        return Err(ApiError::BadRequest(
            "The task is already planned for that date and time".into(),
        ));
    }
    Ok(ShiftPlan::for_dates(task.planned_date, new_date))
}

// Handler to reschedule a delegation task
pub async fn shift_task(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<ShiftTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_staff("shift tasks")?;

    let new_date = parse_date("new_planned_date", &request.new_planned_date)?;
    let task = fetch_task(pool.get_ref(), request.task_id).await?;
    let new_time = optional("new_planned_time", request.new_planned_time.as_deref(), parse_time)?
        .or(task.planned_time);

    let plan = validate_shift(&task, new_date, new_time)?;
    let increment = plan.counter_increment();

    let live_task_id = match plan {
        ShiftPlan::SameWeek => shift_in_place(pool.get_ref(), &task, new_date, new_time, increment).await?,
        ShiftPlan::NewWeek => shift_into_new_week(pool.get_ref(), &task, new_date, new_time, increment).await?,
    };

    let shift_type = match plan {
        ShiftPlan::SameWeek => "same_week",
        ShiftPlan::NewWeek => "new_week",
    };
    info!(
        "Task {} shifted ({}) to {} by {}; live row {}",
        task.id, shift_type, new_date, user.username, live_task_id
    );

    let draft = NotificationDraft::new(
        task.doer_id,
        NotificationType::TaskShifted,
        "Task rescheduled",
        format!("\"{}\" moved from {} to {}", task.description, task.planned_date, new_date),
    )
    .related("delegation", live_task_id);
    notify::push_logged(pool.get_ref(), &draft).await;

    success_with(
        "Task shifted successfully",
        ShiftTaskResponse {
            task_id: live_task_id,
            original_task_id: task.id,
            shift_type,
            shifted_count: task.shifted_count + increment,
        },
    )
}

const SHIFT_RACED: &str = "Task was not shifted; it changed while you were shifting it";

/// Moves the row itself; only valid while the new date stays in its week.
pub async fn shift_in_place(
    pool: &MySqlPool,
    task: &Task,
    new_date: NaiveDate,
    new_time: Option<NaiveTime>,
    increment: i32,
) -> Result<i32, ApiError> {
    let affected = sqlx::query(
        "UPDATE tasks SET planned_date = ?, planned_time = ?, shifted_count = shifted_count + ?
         WHERE id = ? AND status = ?",
    )
    .bind(new_date)
    .bind(new_time)
    .bind(increment)
    .bind(task.id)
    .bind(&task.status)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::Conflict(SHIFT_RACED.into()));
    }
    Ok(task.id)
}

/// Closes the row as shifted and opens its replacement, all or nothing. Returns the new row's id.
pub async fn shift_into_new_week(
    pool: &MySqlPool,
    task: &Task,
    new_date: NaiveDate,
    new_time: Option<NaiveTime>,
    increment: i32,
) -> Result<i32, ApiError> {
    // Start a transaction
    let mut tx = pool.begin().await?;
    match move_to_new_week(&mut tx, task, new_date, new_time, increment).await {
        Ok(new_id) => {
            tx.commit().await?;
            Ok(new_id)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("Failed to roll back shift of task {}: {}", task.id, rollback_err);
            }
            Err(e)
        }
    }
}

async fn move_to_new_week(
    tx: &mut Transaction<'_, MySql>,
    task: &Task,
    new_date: NaiveDate,
    new_time: Option<NaiveTime>,
    increment: i32,
) -> Result<i32, ApiError> {
    let affected = sqlx::query(
        "UPDATE tasks SET status = 'shifted', shifted_count = shifted_count + ?
         WHERE id = ? AND status = ?",
    )
    .bind(increment)
    .bind(task.id)
    .bind(&task.status)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::Conflict(SHIFT_RACED.into()));
    }

    let result = sqlx::query(
        "INSERT INTO tasks
            (unique_id, description, doer_id, assigned_by, department_id, planned_date, planned_time,
             duration_minutes, status, is_delayed, shifted_count, original_task_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, 0, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&task.description)
    .bind(task.doer_id)
    .bind(task.assigned_by)
    .bind(task.department_id)
    .bind(new_date)
    .bind(new_time)
    .bind(task.duration_minutes)
    .bind(task.id)
    .execute(&mut **tx)
    .await?;

    inserted_id(result.last_insert_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: &str, planned: &str, time: Option<&str>) -> Task {
        Task {
            id: 11,
            unique_id: "u-11".into(),
            description: "Send invoice".into(),
            doer_id: 4,
            doer_name: None,
            assigned_by: Some(1),
            department_id: None,
            planned_date: NaiveDate::parse_from_str(planned, "%Y-%m-%d").unwrap(),
            planned_time: time.map(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").unwrap()),
            duration_minutes: Some(30),
            status: status.into(),
            actual_date: None,
            actual_time: None,
            is_delayed: false,
            delay_duration: None,
            shifted_count: 0,
            original_task_id: None,
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn shifting_inside_the_week_adds_one() {
        // Wednesday -> Sunday of the same week
        let plan = validate_shift(&task("pending", "2024-05-15", None), day("2024-05-19"), None).unwrap();
        assert_eq!(plan, ShiftPlan::SameWeek);
        assert_eq!(plan.counter_increment(), 1);
    }

    #[test]
    fn shifting_to_next_week_adds_two() {
        let plan = validate_shift(&task("pending", "2024-05-15", None), day("2024-05-20"), None).unwrap();
        assert_eq!(plan, ShiftPlan::NewWeek);
        assert_eq!(plan.counter_increment(), 2);
    }

    #[test]
    fn completed_and_shifted_tasks_cannot_move() {
        assert!(validate_shift(&task("completed", "2024-05-15", None), day("2024-05-16"), None).is_err());
        assert!(validate_shift(&task("shifted", "2024-05-15", None), day("2024-05-16"), None).is_err());
    }

    #[test]
    fn a_time_only_change_is_a_same_week_shift() {
        let t = task("not done", "2024-05-15", Some("10:00:00"));
        let later = NaiveTime::from_hms_opt(15, 0, 0);
        assert_eq!(validate_shift(&t, day("2024-05-15"), later).unwrap(), ShiftPlan::SameWeek);
        assert!(validate_shift(&t, day("2024-05-15"), t.planned_time).is_err());
    }

    #[test]
    fn editing_a_completed_deadline_recomputes_the_delay() {
        let mut t = task("completed", "2024-05-15", Some("10:00:00"));
        t.actual_date = Some(day("2024-05-16"));
        t.actual_time = NaiveTime::from_hms_opt(12, 0, 0);

        let later_deadline = delay::delegation_deadline(day("2024-05-17"), None);
        assert_eq!(recompute_delay(&t, later_deadline), Delay::none());

        let earlier_deadline = delay::delegation_deadline(day("2024-05-15"), NaiveTime::from_hms_opt(12, 0, 0));
        let delay = recompute_delay(&t, earlier_deadline);
        assert!(delay.is_delayed);
        assert_eq!(delay.duration.as_deref(), Some("1 day 00:00:00"));
    }

    #[test]
    fn pending_tasks_carry_no_delay_after_edit() {
        let t = task("pending", "2024-05-15", None);
        assert_eq!(recompute_delay(&t, delay::delegation_deadline(day("2024-05-01"), None)), Delay::none());
    }
}
