use serde::Serialize;

#[derive(Serialize)]
pub struct SessionsDeletedResponse {
    pub deleted: u64,
}
