use actix_web::{web, HttpResponse};
use chrono::NaiveDateTime;
use log::{info, warn};
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::requests_models::{
    DecideLeaveRequest, DecideMeetingRequest, Decision, ListLeaveQuery, ListLeaveResponse,
    ListMeetingsResponse, SubmitLeaveRequest, SubmitLeaveResponse, SubmitMeetingRequest,
    SubmitMeetingResponse,
};
use crate::auth::CurrentUser;
use crate::delay;
use crate::error::{inserted_id, ApiError};
use crate::models::notification::{ActionButton, NotificationType};
use crate::models::request::{LeaveRequest, MeetingRequest};
use crate::models::user::AccountStatus;
use crate::notify::{self, NotificationDraft};
use crate::response::success_with;
use crate::routes::form::{optional, parse_date, parse_datetime, required_text};

const LEAVE_COLUMNS: &str = "l.id, l.user_id, u.username, l.start_date, l.end_date, l.reason, l.status, \
     l.decided_by, l.decided_at, l.created_at";
const MEETING_COLUMNS: &str =
    "id, requester_id, with_user_id, agenda, proposed_at, scheduled_at, status, created_at";

fn decision_buttons(action: &str, id: i32, choices: &[Decision]) -> Vec<ActionButton> {
    choices
        .iter()
        .map(|decision| ActionButton {
            label: match decision {
                Decision::Approved => "Approve",
                Decision::Rejected => "Reject",
                Decision::Rescheduled => "Reschedule",
            }
            .to_string(),
            action: action.to_string(),
            id,
            value: decision.as_str().to_string(),
        })
        .collect()
}

/// Managers decide for their own team, admins for everyone.
pub fn can_decide_leave(user: &CurrentUser, requester_id: i32, requester_manager_id: Option<i32>) -> Result<(), ApiError> {
    if user.id == requester_id {
        return Err(ApiError::Forbidden("You cannot decide your own leave request".into()));
    }
    if user.is_admin() || (user.is_manager() && requester_manager_id == Some(user.id)) {
        return Ok(());
    }
    Err(ApiError::Forbidden("Only the requester's manager or an admin can decide this leave".into()))
}

pub fn leave_decision(raw: &str) -> Result<Decision, ApiError> {
    match Decision::parse(raw).map_err(ApiError::BadRequest)? {
        Decision::Rescheduled => Err(ApiError::BadRequest("Leave can only be approved or rejected".into())),
        decision => Ok(decision),
    }
}

/// Resolves when a decided meeting takes place, `None` for a rejection.
pub fn meeting_schedule(
    current_status: &str,
    decision: Decision,
    proposed_at: NaiveDateTime,
    scheduled_at: Option<NaiveDateTime>,
) -> Result<Option<NaiveDateTime>, ApiError> {
    if !matches!(current_status, "pending" | "rescheduled") {
        return Err(ApiError::BadRequest(format!("This meeting is already {}", current_status)));
    }
    match decision {
        Decision::Approved => Ok(Some(scheduled_at.unwrap_or(proposed_at))),
        Decision::Rescheduled => scheduled_at
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest("scheduled_at is required to reschedule".into())),
        Decision::Rejected => Ok(None),
    }
}

async fn leave_approvers(pool: &MySqlPool, user: &CurrentUser) -> Result<Vec<i32>, sqlx::Error> {
    if let Some(manager_id) = user.manager_id {
        let active: Option<String> = sqlx::query_scalar("SELECT Status FROM users WHERE id = ?")
            .bind(manager_id)
            .fetch_optional(pool)
            .await?;
        if active.and_then(|status| status.parse::<AccountStatus>().ok()) == Some(AccountStatus::Active) {
            return Ok(vec![manager_id]);
        }
    }
    sqlx::query_scalar("SELECT id FROM users WHERE user_type = 'admin' AND Status = 'Active' AND id <> ?")
        .bind(user.id)
        .fetch_all(pool)
        .await
}

fn approvers_or_nobody(leave_id: i32, lookup: Result<Vec<i32>, sqlx::Error>) -> Vec<i32> {
    lookup.unwrap_or_else(|e| {
        warn!("Could not find approvers for leave request {}: {}", leave_id, e);
        Vec::new()
    })
}

// Handler for a user to ask for leave
pub async fn submit_leave(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<SubmitLeaveRequest>,
) -> Result<HttpResponse, ApiError> {
    let start_date = parse_date("start_date", &request.start_date)?;
    let end_date = parse_date("end_date", &request.end_date)?;
    if end_date < start_date {
        return Err(ApiError::BadRequest("end_date cannot be before start_date".into()));
    }
    let reason = required_text("reason", &request.reason)?;

    let result = sqlx::query(
        "INSERT INTO Leave_request (user_id, start_date, end_date, reason, status, created_at)
         VALUES (?, ?, ?, ?, 'pending', ?)",
    )
    .bind(user.id)
    .bind(start_date)
    .bind(end_date)
    .bind(&reason)
    .bind(delay::now())
    .execute(pool.get_ref())
    .await?;
    let leave_id = inserted_id(result.last_insert_id())?;
    info!("Leave request {} submitted by {}", leave_id, user.username);

    // The request is stored; a failed lookup only costs the notifications.
    let approvers = approvers_or_nobody(leave_id, leave_approvers(pool.get_ref(), &user).await);
    let buttons = decision_buttons(
        "decide_leave",
        leave_id,
        &[Decision::Approved, Decision::Rejected],
    );
    for approver in &approvers {
        let draft = NotificationDraft::new(
            *approver,
            NotificationType::LeaveRequest,
            "Leave request",
            format!("{} requested leave from {} to {}: {}", user.name, start_date, end_date, reason),
        )
        .related("leave", leave_id)
        .with_buttons(&buttons);
        notify::push_logged(pool.get_ref(), &draft).await;
    }

    success_with(
        "Leave request submitted",
        SubmitLeaveResponse {
            leave_id,
            notified: approvers.len(),
        },
    )
}

pub async fn decide_leave(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<DecideLeaveRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_staff("decide leave requests")?;
    let decision = leave_decision(&request.decision)?;

    let leave: Option<(i32, String, Option<i32>)> = sqlx::query_as(
        "SELECT l.user_id, l.status, u.manager_id FROM Leave_request l JOIN users u ON u.id = l.user_id
         WHERE l.id = ?",
    )
    .bind(request.leave_id)
    .fetch_optional(pool.get_ref())
    .await?;
    let (requester_id, status, manager_id) =
        leave.ok_or_else(|| ApiError::NotFound("Leave request not found".into()))?;

    can_decide_leave(&user, requester_id, manager_id)?;
    if status != "pending" {
        return Err(ApiError::BadRequest(format!("This leave request is already {}", status)));
    }

    let affected = sqlx::query(
        "UPDATE Leave_request SET status = ?, decided_by = ?, decided_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(decision.as_str())
    .bind(user.id)
    .bind(delay::now())
    .bind(request.leave_id)
    .execute(pool.get_ref())
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(ApiError::Conflict("This leave request was decided by someone else".into()));
    }
    info!("Leave request {} {} by {}", request.leave_id, decision.as_str(), user.username);

    let kind = if decision == Decision::Approved {
        NotificationType::LeaveApproved
    } else {
        NotificationType::LeaveRejected
    };
    let draft = NotificationDraft::new(
        requester_id,
        kind,
        format!("Leave {}", decision.as_str()),
        format!("{} {} your leave request", user.name, decision.as_str()),
    )
    .related("leave", request.leave_id);
    notify::push_logged(pool.get_ref(), &draft).await;

    success_with(
        format!("Leave request {}", decision.as_str()),
        serde_json::json!({ "leave_id": request.leave_id, "decision": decision.as_str() }),
    )
}

pub async fn list_leave(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    query: web::Query<ListLeaveQuery>,
) -> Result<HttpResponse, ApiError> {
    let team = matches!(query.scope.as_deref().map(str::trim), Some("team"));

    let mut builder = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM Leave_request l JOIN users u ON u.id = l.user_id WHERE 1 = 1",
        LEAVE_COLUMNS
    ));
    if !team {
        builder.push(" AND l.user_id = ").push_bind(user.id);
    } else if user.is_manager() {
        builder.push(" AND u.manager_id = ").push_bind(user.id);
    } else if !user.is_admin() {
        return Err(ApiError::Forbidden("Only managers and admins can view team leave".into()));
    }
    builder.push(" ORDER BY l.created_at DESC, l.id DESC");

    let requests = builder
        .build_query_as::<LeaveRequest>()
        .fetch_all(pool.get_ref())
        .await?;

    success_with(format!("{} leave requests", requests.len()), ListLeaveResponse { requests })
}

// Handler to invite someone to a meeting
pub async fn submit_meeting(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<SubmitMeetingRequest>,
) -> Result<HttpResponse, ApiError> {
    let agenda = required_text("agenda", &request.agenda)?;
    let proposed_at = parse_datetime("proposed_at", &request.proposed_at)?;
    if request.with_user_id == user.id {
        return Err(ApiError::BadRequest("You cannot request a meeting with yourself".into()));
    }

    let invitee: Option<String> = sqlx::query_scalar("SELECT Status FROM users WHERE id = ?")
        .bind(request.with_user_id)
        .fetch_optional(pool.get_ref())
        .await?;
    match invitee.map(|status| status.parse::<AccountStatus>()) {
        None => return Err(ApiError::BadRequest("Invitee not found".into())),
        Some(Ok(AccountStatus::Active)) => {}
        Some(_) => return Err(ApiError::BadRequest("Invitee is inactive".into())),
    }

    let result = sqlx::query(
        "INSERT INTO meeting_requests (requester_id, with_user_id, agenda, proposed_at, status, created_at)
         VALUES (?, ?, ?, ?, 'pending', ?)",
    )
    .bind(user.id)
    .bind(request.with_user_id)
    .bind(&agenda)
    .bind(proposed_at)
    .bind(delay::now())
    .execute(pool.get_ref())
    .await?;
    let meeting_id = inserted_id(result.last_insert_id())?;
    info!("Meeting {} requested by {} with user {}", meeting_id, user.username, request.with_user_id);

    let draft = NotificationDraft::new(
        request.with_user_id,
        NotificationType::MeetingRequest,
        "Meeting request",
        format!("{} wants to meet at {}: {}", user.name, proposed_at.format("%Y-%m-%d %H:%M"), agenda),
    )
    .related("meeting", meeting_id)
    .with_buttons(&decision_buttons(
        "decide_meeting",
        meeting_id,
        &[Decision::Approved, Decision::Rescheduled, Decision::Rejected],
    ));
    notify::push_logged(pool.get_ref(), &draft).await;

    success_with("Meeting request sent", SubmitMeetingResponse { meeting_id })
}

pub async fn decide_meeting(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
    request: web::Form<DecideMeetingRequest>,
) -> Result<HttpResponse, ApiError> {
    let decision = Decision::parse(&request.decision).map_err(ApiError::BadRequest)?;
    let scheduled_at = optional("scheduled_at", request.scheduled_at.as_deref(), parse_datetime)?;

    let meeting = sqlx::query_as::<_, MeetingRequest>(&format!(
        "SELECT {} FROM meeting_requests WHERE id = ?",
        MEETING_COLUMNS
    ))
    .bind(request.meeting_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Meeting request not found".into()))?;

    if meeting.with_user_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden("Only the invitee can answer this meeting request".into()));
    }
    let schedule = meeting_schedule(&meeting.status, decision, meeting.proposed_at, scheduled_at)?;

    let affected = sqlx::query("UPDATE meeting_requests SET status = ?, scheduled_at = ? WHERE id = ? AND status = ?")
        .bind(decision.as_str())
        .bind(schedule)
        .bind(meeting.id)
        .bind(&meeting.status)
        .execute(pool.get_ref())
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(ApiError::Conflict("This meeting request changed while you were answering it".into()));
    }
    info!("Meeting {} {} by {}", meeting.id, decision.as_str(), user.username);

    let (kind, message) = match (decision, schedule) {
        (Decision::Approved, Some(at)) => (
            NotificationType::MeetingApproved,
            format!("{} accepted your meeting for {}", user.name, at.format("%Y-%m-%d %H:%M")),
        ),
        (Decision::Rescheduled, Some(at)) => (
            NotificationType::MeetingRescheduled,
            format!("{} moved your meeting to {}", user.name, at.format("%Y-%m-%d %H:%M")),
        ),
        _ => (
            NotificationType::MeetingRejected,
            format!("{} declined your meeting request", user.name),
        ),
    };
    let draft = NotificationDraft::new(meeting.requester_id, kind, format!("Meeting {}", decision.as_str()), message)
        .related("meeting", meeting.id);
    notify::push_logged(pool.get_ref(), &draft).await;

    success_with(
        format!("Meeting {}", decision.as_str()),
        serde_json::json!({
            "meeting_id": meeting.id,
            "decision": decision.as_str(),
            "scheduled_at": schedule,
        }),
    )
}

pub async fn list_meetings(
    pool: web::Data<MySqlPool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let meetings = sqlx::query_as::<_, MeetingRequest>(&format!(
        "SELECT {} FROM meeting_requests WHERE requester_id = ? OR with_user_id = ?
         ORDER BY proposed_at DESC, id DESC",
        MEETING_COLUMNS
    ))
    .bind(user.id)
    .bind(user.id)
    .fetch_all(pool.get_ref())
    .await?;

    success_with(format!("{} meetings", meetings.len()), ListMeetingsResponse { meetings })
}
