use serde::Deserialize;

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub task_id: i32,
    pub task_type: String,
    pub new_status: String,
}
