use actix_web::{
    body::BoxBody,
    dev::ServiceResponse,
    error::{JsonPayloadError, QueryPayloadError, UrlencodedError},
    http::StatusCode,
    middleware::ErrorHandlerResponse,
    HttpRequest, HttpResponse, ResponseError,
};
use log::{error, info};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl ApiError {
    /// Message shown to the client. Database details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Narrows `last_insert_id()` to the INT columns that reference the new row.
pub fn inserted_id(id: u64) -> Result<i32, ApiError> {
    i32::try_from(id).map_err(|_| ApiError::Internal(format!("Inserted id {} is out of range", id)))
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            ApiError::Database(e) => error!("Database error: {}", e),
            ApiError::Internal(message) | ApiError::Upstream(message) => error!("{}", message),
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            status: "error",
            message: self.public_message(),
        })
    }
}

// Extractor failures become the JSON envelope instead of actix's plain-text body.

pub fn form_error_handler(err: UrlencodedError, req: &HttpRequest) -> actix_web::Error {
    info!("Rejected form body for {}: {}", req.path(), err);
    ApiError::BadRequest(format!("Missing or invalid parameters: {}", err)).into()
}

pub fn query_error_handler(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    info!("Rejected query string for {}: {}", req.path(), err);
    ApiError::BadRequest(format!("Missing or invalid parameters: {}", err)).into()
}

pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    info!("Rejected JSON body for {}: {}", req.path(), err);
    ApiError::BadRequest(format!("Invalid JSON body: {}", err)).into()
}

pub async fn not_found(req: HttpRequest) -> HttpResponse {
    info!("No route for {} {}", req.method(), req.path());
    ApiError::NotFound(format!("No endpoint at {}", req.path())).error_response()
}

pub fn method_not_allowed<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let (req, _) = res.into_parts();
    let response = ApiError::MethodNotAllowed.error_response();
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn status_codes_follow_the_variant() {
        assert_eq!(ApiError::Unauthenticated("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn inserted_ids_must_fit_an_int_column() {
        assert_eq!(inserted_id(42).unwrap(), 42);
        assert_eq!(inserted_id(i32::MAX as u64).unwrap(), i32::MAX);
        assert!(matches!(inserted_id(i32::MAX as u64 + 1), Err(ApiError::Internal(_))));
    }

    #[actix_web::test]
    async fn database_errors_do_not_leak_details() {
        let response = ApiError::Database(sqlx::Error::Protocol("secret table layout".into()))
            .error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "A database error occurred");
    }

    #[actix_web::test]
    async fn error_body_carries_the_message() {
        let response = ApiError::Forbidden("This task is not assigned to you".into()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "This task is not assigned to you");
    }
}
