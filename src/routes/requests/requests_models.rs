use serde::{Deserialize, Serialize};

use crate::models::request::{LeaveRequest, MeetingRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
    Rescheduled,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
            Decision::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_lowercase().as_str() {
            "approved" | "approve" => Ok(Decision::Approved),
            "rejected" | "reject" => Ok(Decision::Rejected),
            "rescheduled" | "reschedule" => Ok(Decision::Rescheduled),
            other => Err(format!("Unknown decision: {}", other)),
        }
    }
}


#[derive(Deserialize)]
pub struct SubmitLeaveRequest {
    pub start_date: String,
    pub end_date: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct SubmitLeaveResponse {
    pub leave_id: i32,
    pub notified: usize,
}

#[derive(Deserialize)]
pub struct DecideLeaveRequest {
    pub leave_id: i32,
    pub decision: String,
}

#[derive(Deserialize)]
pub struct ListLeaveQuery {
    pub scope: Option<String>,
}

#[derive(Serialize)]
pub struct ListLeaveResponse {
    pub requests: Vec<LeaveRequest>,
}


#[derive(Deserialize)]
pub struct SubmitMeetingRequest {
    pub with_user_id: i32,
    pub agenda: String,
    pub proposed_at: String,
}

#[derive(Serialize)]
pub struct SubmitMeetingResponse {
    pub meeting_id: i32,
}

#[derive(Deserialize)]
pub struct DecideMeetingRequest {
    pub meeting_id: i32,
    pub decision: String,
    pub scheduled_at: Option<String>,
}

#[derive(Serialize)]
pub struct ListMeetingsResponse {
    pub meetings: Vec<MeetingRequest>,
}
