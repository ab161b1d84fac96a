//! Status changes shared by the delegation, checklist and multi-type endpoints.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::info;
use serde::Serialize;
use sqlx::MySqlPool;

use crate::auth::CurrentUser;
use crate::delay::{self, Delay, DelayFormat};
use crate::error::ApiError;
use crate::models::checklist::{ChecklistSubtask, CHECKLIST_COLUMNS};
use crate::models::notification::NotificationType;
use crate::models::task::{Task, TaskKind, TaskStatus, TASK_COLUMNS};
use crate::notify::{self, NotificationDraft};

const NOT_UPDATED: &str =
    "Task was not updated; it may have been changed by someone else or is no longer assigned to you";

#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
    pub task_id: i32,
    pub kind: TaskKind,
    pub new_status: TaskStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusOutcome {
    pub task_id: i32,
    pub task_type: TaskKind,
    pub new_status: TaskStatus,
    pub is_delayed: bool,
    pub delay_duration: Option<String>,
    pub already_set: bool,
}

impl StatusOutcome {
    pub fn message(&self) -> String {
        if self.already_set {
            format!("Task status is already {}", self.new_status)
        } else {
            format!("Task marked as {}", self.new_status)
        }
    }
}

/// Checks that need no row: who may request which status at all.
pub fn authorize_role(user: &CurrentUser, new_status: TaskStatus) -> Result<(), ApiError> {
    if user.is_client() {
        return Err(ApiError::Forbidden("Clients cannot update task status".into()));
    }
    if new_status == TaskStatus::Shifted {
        return Err(ApiError::BadRequest(
            "Use the shift action to reschedule a task".into(),
        ));
    }
    if user.is_doer() && new_status == TaskStatus::Pending {
        return Err(ApiError::Forbidden("Only admins and managers can reopen a task".into()));
    }
    Ok(())
}

pub fn authorize_status_change(user: &CurrentUser, owns_task: bool, new_status: TaskStatus) -> Result<(), ApiError> {
    authorize_role(user, new_status)?;
    if user.is_doer() && !owns_task {
        return Err(ApiError::Forbidden("This task is not assigned to you".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub actual_date: Option<NaiveDate>,
    pub actual_time: Option<NaiveTime>,
    pub delay: Delay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPlan {
    AlreadySet,
    Update(Completion),
}

pub fn plan_status_change(
    current: &str,
    new_status: TaskStatus,
    deadline: NaiveDateTime,
    now: NaiveDateTime,
    format: DelayFormat,
) -> Result<StatusPlan, ApiError> {
    let current = current.parse::<TaskStatus>().ok();
    if current == Some(TaskStatus::Shifted) {
        return Err(ApiError::BadRequest(
            "This task was shifted; update the rescheduled task instead".into(),
        ));
    }
    if current == Some(new_status) {
        return Ok(StatusPlan::AlreadySet);
    }

    // Delay fields only carry meaning on completed rows.
    let completion = if new_status == TaskStatus::Completed {
        Completion {
            actual_date: Some(now.date()),
            actual_time: Some(now.time()),
            delay: delay::compute_delay(deadline, now, format),
        }
    } else {
        Completion {
            actual_date: None,
            actual_time: None,
            delay: Delay::none(),
        }
    };
    Ok(StatusPlan::Update(completion))
}

pub async fn apply(
    pool: &MySqlPool,
    user: &CurrentUser,
    change: StatusChange,
    now: NaiveDateTime,
) -> Result<StatusOutcome, ApiError> {
    match change.kind {
        TaskKind::Delegation => apply_delegation(pool, user, change, now).await,
        TaskKind::Checklist => apply_checklist(pool, user, change, now).await,
        TaskKind::Fms => Err(ApiError::BadRequest(
            "FMS tasks are read-only here; update them in their source sheet".into(),
        )),
    }
}

fn outcome(change: StatusChange, delay: &Delay, already_set: bool) -> StatusOutcome {
    StatusOutcome {
        task_id: change.task_id,
        task_type: change.kind,
        new_status: change.new_status,
        is_delayed: delay.is_delayed,
        delay_duration: delay.duration.clone(),
        already_set,
    }
}

async fn apply_delegation(
    pool: &MySqlPool,
    user: &CurrentUser,
    change: StatusChange,
    now: NaiveDateTime,
) -> Result<StatusOutcome, ApiError> {
    authorize_role(user, change.new_status)?;

    let task = sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks t WHERE t.id = ?", TASK_COLUMNS))
        .bind(change.task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    authorize_status_change(user, task.doer_id == user.id, change.new_status)?;

    let deadline = delay::delegation_deadline(task.planned_date, task.planned_time);
    let completion = match plan_status_change(&task.status, change.new_status, deadline, now, DelayFormat::DaysHms)? {
        StatusPlan::AlreadySet => {
            let current = Delay {
                is_delayed: task.is_delayed,
                duration: task.delay_duration.clone(),
            };
            return Ok(outcome(change, &current, true));
        }
        StatusPlan::Update(completion) => completion,
    };

    write_delegation(pool, user, &task, change.new_status, &completion).await?;

    info!(
        "Task {} set to {} by {} (delayed: {})",
        task.id, change.new_status, user.username, completion.delay.is_delayed
    );

    if change.new_status == TaskStatus::Completed {
        if let Some(assigner) = task.assigned_by.filter(|id| *id != user.id) {
            let mut message = format!("{} completed \"{}\"", user.name, task.description);
            if let Some(late) = &completion.delay.duration {
                message.push_str(&format!(" ({} late)", late));
            }
            let draft = NotificationDraft::new(assigner, NotificationType::TaskCompleted, "Task completed", message)
                .related("delegation", task.id);
            notify::push_logged(pool, &draft).await;
        }
    }

    Ok(outcome(change, &completion.delay, false))
}

/// Writes the change only if the row still has the status `task` was read with.
async fn write_delegation(
    pool: &MySqlPool,
    user: &CurrentUser,
    task: &Task,
    new_status: TaskStatus,
    completion: &Completion,
) -> Result<(), ApiError> {
    let mut sql = String::from(
        "UPDATE tasks SET status = ?, actual_date = ?, actual_time = ?, is_delayed = ?, delay_duration = ?
         WHERE id = ? AND status = ?",
    );
    if user.is_doer() {
        sql.push_str(" AND doer_id = ?");
    }
    let mut query = sqlx::query(&sql)
        .bind(new_status.as_str())
        .bind(completion.actual_date)
        .bind(completion.actual_time)
        .bind(completion.delay.is_delayed)
        .bind(&completion.delay.duration)
        .bind(task.id)
        .bind(&task.status);
    if user.is_doer() {
        query = query.bind(user.id);
    }

    let affected = query.execute(pool).await?.rows_affected();
    if affected == 0 {
        info!("Status update for task {} by {} affected no rows", task.id, user.username);
        return Err(ApiError::Conflict(NOT_UPDATED.into()));
    }
    Ok(())
}

async fn apply_checklist(
    pool: &MySqlPool,
    user: &CurrentUser,
    change: StatusChange,
    now: NaiveDateTime,
) -> Result<StatusOutcome, ApiError> {
    authorize_role(user, change.new_status)?;

    let subtask = sqlx::query_as::<_, ChecklistSubtask>(&format!(
        "SELECT {} FROM checklist_subtasks c WHERE c.id = ?",
        CHECKLIST_COLUMNS
    ))
    .bind(change.task_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Checklist task not found".into()))?;

    let owns = subtask.assignee.eq_ignore_ascii_case(&user.username);
    authorize_status_change(user, owns, change.new_status)?;

    let deadline = delay::checklist_deadline(subtask.task_date);
    let completion = match plan_status_change(&subtask.status, change.new_status, deadline, now, DelayFormat::Hms)? {
        StatusPlan::AlreadySet => {
            let current = Delay {
                is_delayed: subtask.is_delayed,
                duration: subtask.delay_duration.clone(),
            };
            return Ok(outcome(change, &current, true));
        }
        StatusPlan::Update(completion) => completion,
    };

    write_checklist(pool, user, &subtask, change.new_status, &completion).await?;

    info!(
        "Checklist task {} set to {} by {} (delayed: {})",
        subtask.id, change.new_status, user.username, completion.delay.is_delayed
    );
    Ok(outcome(change, &completion.delay, false))
}

async fn write_checklist(
    pool: &MySqlPool,
    user: &CurrentUser,
    subtask: &ChecklistSubtask,
    new_status: TaskStatus,
    completion: &Completion,
) -> Result<(), ApiError> {
    let mut sql = String::from(
        "UPDATE checklist_subtasks SET status = ?, actual_date = ?, actual_time = ?, is_delayed = ?, delay_duration = ?
         WHERE id = ? AND status = ?",
    );
    if user.is_doer() {
        sql.push_str(" AND assignee = ?");
    }
    let mut query = sqlx::query(&sql)
        .bind(new_status.as_str())
        .bind(completion.actual_date)
        .bind(completion.actual_time)
        .bind(completion.delay.is_delayed)
        .bind(&completion.delay.duration)
        .bind(subtask.id)
        .bind(&subtask.status);
    if user.is_doer() {
        query = query.bind(&subtask.assignee);
    }

    let affected = query.execute(pool).await?.rows_affected();
    if affected == 0 {
        info!("Status update for checklist {} by {} affected no rows", subtask.id, user.username);
        return Err(ApiError::Conflict(NOT_UPDATED.into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserType;

    fn user(user_type: UserType) -> CurrentUser {
        CurrentUser {
            id: 9,
            username: "kiran".into(),
            name: "Kiran".into(),
            user_type,
            manager_id: Some(2),
            department_id: None,
            session_id: "s".into(),
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn doer_cannot_complete_someone_elses_task() {
        let result = authorize_status_change(&user(UserType::Doer), false, TaskStatus::Completed);
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn doer_can_complete_own_task() {
        assert!(authorize_status_change(&user(UserType::Doer), true, TaskStatus::Completed).is_ok());
        assert!(authorize_status_change(&user(UserType::Doer), true, TaskStatus::NotDone).is_ok());
    }

    #[test]
    fn doer_cannot_reopen() {
        let result = authorize_status_change(&user(UserType::Doer), true, TaskStatus::Pending);
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn admins_and_managers_skip_the_ownership_check() {
        assert!(authorize_status_change(&user(UserType::Admin), false, TaskStatus::Completed).is_ok());
        assert!(authorize_status_change(&user(UserType::Manager), false, TaskStatus::Pending).is_ok());
    }

    #[test]
    fn clients_and_shifts_are_refused() {
        assert!(matches!(
            authorize_role(&user(UserType::Client), TaskStatus::Completed),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_role(&user(UserType::Admin), TaskStatus::Shifted),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn same_status_is_already_set() {
        let plan = plan_status_change(
            "completed",
            TaskStatus::Completed,
            at("2024-02-01 23:59:59"),
            at("2024-02-03 08:00:00"),
            DelayFormat::Hms,
        )
        .unwrap();
        assert_eq!(plan, StatusPlan::AlreadySet);

        let spaced = plan_status_change(
            "can not be done",
            TaskStatus::CanNotBeDone,
            at("2024-02-01 23:59:59"),
            at("2024-02-01 08:00:00"),
            DelayFormat::Hms,
        )
        .unwrap();
        assert_eq!(spaced, StatusPlan::AlreadySet);
    }

    #[test]
    fn completing_a_checklist_late_records_the_delay() {
        let plan = plan_status_change(
            "pending",
            TaskStatus::Completed,
            delay::checklist_deadline(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            at("2024-02-02 01:02:03"),
            DelayFormat::Hms,
        )
        .unwrap();
        match plan {
            StatusPlan::Update(completion) => {
                assert_eq!(completion.actual_date, NaiveDate::from_ymd_opt(2024, 2, 2));
                assert!(completion.delay.is_delayed);
                assert_eq!(completion.delay.duration.as_deref(), Some("01:02:04"));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn leaving_completed_clears_delay_fields() {
        let plan = plan_status_change(
            "completed",
            TaskStatus::NotDone,
            at("2024-02-01 10:00:00"),
            at("2024-02-05 10:00:00"),
            DelayFormat::DaysHms,
        )
        .unwrap();
        assert_eq!(
            plan,
            StatusPlan::Update(Completion {
                actual_date: None,
                actual_time: None,
                delay: Delay::none(),
            })
        );
    }

    #[test]
    fn shifted_rows_are_closed() {
        let result = plan_status_change(
            "shifted",
            TaskStatus::Completed,
            at("2024-02-01 10:00:00"),
            at("2024-02-01 09:00:00"),
            DelayFormat::DaysHms,
        );
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn outcome_messages_distinguish_already_set() {
        let change = StatusChange {
            task_id: 3,
            kind: TaskKind::Checklist,
            new_status: TaskStatus::Completed,
        };
        assert_eq!(outcome(change, &Delay::none(), true).message(), "Task status is already completed");
        assert_eq!(outcome(change, &Delay::none(), false).message(), "Task marked as completed");
    }
}

// Run with `cargo test -- --ignored` against a MySQL DATABASE_URL; each test gets a fresh database.
#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::models::user::UserType;

    fn kiran(user_type: UserType) -> CurrentUser {
        CurrentUser {
            id: 9,
            username: "kiran".into(),
            name: "Kiran".into(),
            user_type,
            manager_id: None,
            department_id: None,
            session_id: "s".into(),
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn finished_now() -> Completion {
        Completion {
            actual_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            actual_time: NaiveTime::from_hms_opt(9, 0, 0),
            delay: Delay::none(),
        }
    }

    async fn insert_task(pool: &MySqlPool, doer_id: i32) -> i32 {
        let result = sqlx::query(
            "INSERT INTO tasks (unique_id, description, doer_id, assigned_by, planned_date, planned_time, status)
             VALUES (UUID(), 'File returns', ?, 1, '2024-02-01', '10:00:00', 'pending')",
        )
        .bind(doer_id)
        .execute(pool)
        .await
        .unwrap();
        result.last_insert_id() as i32
    }

    async fn read_task(pool: &MySqlPool, id: i32) -> Task {
        sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks t WHERE t.id = ?", TASK_COLUMNS))
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a MySQL DATABASE_URL"]
    async fn late_completion_is_stored_with_its_delay(pool: MySqlPool) {
        let id = insert_task(&pool, 9).await;
        let change = StatusChange {
            task_id: id,
            kind: TaskKind::Delegation,
            new_status: TaskStatus::Completed,
        };

        let outcome = apply(&pool, &kiran(UserType::Doer), change, at("2024-02-03 10:00:00")).await.unwrap();
        assert!(outcome.is_delayed);
        assert!(!outcome.already_set);

        let row = read_task(&pool, id).await;
        assert_eq!(row.status, "completed");
        assert_eq!(row.actual_date, NaiveDate::from_ymd_opt(2024, 2, 3));
        assert!(row.is_delayed);
        assert_eq!(row.delay_duration, outcome.delay_duration);

        let again = apply(&pool, &kiran(UserType::Doer), change, at("2024-02-04 10:00:00")).await.unwrap();
        assert!(again.already_set);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a MySQL DATABASE_URL"]
    async fn stale_delegation_write_conflicts(pool: MySqlPool) {
        let id = insert_task(&pool, 9).await;
        let seen = read_task(&pool, id).await;
        sqlx::query("UPDATE tasks SET status = 'not done' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let result = write_delegation(&pool, &kiran(UserType::Admin), &seen, TaskStatus::Completed, &finished_now()).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(read_task(&pool, id).await.status, "not done");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a MySQL DATABASE_URL"]
    async fn reassigned_task_cannot_be_written_by_the_old_doer(pool: MySqlPool) {
        let id = insert_task(&pool, 9).await;
        let seen = read_task(&pool, id).await;
        sqlx::query("UPDATE tasks SET doer_id = 5 WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let result = write_delegation(&pool, &kiran(UserType::Doer), &seen, TaskStatus::Completed, &finished_now()).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(read_task(&pool, id).await.status, "pending");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a MySQL DATABASE_URL"]
    async fn stale_checklist_write_conflicts(pool: MySqlPool) {
        let result = sqlx::query(
            "INSERT INTO checklist_subtasks (checklist_code, description, assignee, frequency, task_date, status)
             VALUES ('c-1', 'Check stock', 'kiran', 'daily', '2024-02-01', 'pending')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let id = result.last_insert_id() as i32;
        let seen = sqlx::query_as::<_, ChecklistSubtask>(&format!(
            "SELECT {} FROM checklist_subtasks c WHERE c.id = ?",
            CHECKLIST_COLUMNS
        ))
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
        sqlx::query("UPDATE checklist_subtasks SET status = 'completed' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let result = write_checklist(&pool, &kiran(UserType::Doer), &seen, TaskStatus::NotDone, &finished_now()).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }
}
