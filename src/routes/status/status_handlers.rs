use actix_web::{web, HttpResponse};
use log::info;
use sqlx::MySqlPool;

use super::status_models::UpdateStatusRequest;
use crate::auth::CurrentUser;
use crate::delay;
use crate::error::ApiError;
use crate::models::task::{TaskKind, TaskStatus};
use crate::response::success_with;
use crate::status::{self, StatusChange};

// One endpoint for every task type; the type picks the table and the delay format.
pub async fn update_status(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<UpdateStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let kind = request.task_type.parse::<TaskKind>().map_err(ApiError::BadRequest)?;
    let new_status = request.new_status.parse::<TaskStatus>().map_err(ApiError::BadRequest)?;
    info!(
        "{} requested {} task {} -> {}",
        user.username,
        kind.as_str(),
        request.task_id,
        new_status
    );

    let change = StatusChange {
        task_id: request.task_id,
        kind,
        new_status,
    };
    let outcome = status::apply(pool.get_ref(), &user, change, delay::now()).await?;
    success_with(outcome.message(), outcome)
}
