//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{account_service, job_service};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    DatabaseError(sqlx::Error),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<job_service::JobError> for ApiError {
    fn from(err: job_service::JobError) -> Self {
        use job_service::JobError;

        match err {
            JobError::NotFound(id) => ApiError::NotFound(format!("Job {} not found", id)),
            JobError::CategoryNotFound(id) => {
                ApiError::NotFound(format!("Category {} not found", id))
            }
            JobError::AccountNotEnrolled { job_id, account_id } => ApiError::NotFound(format!(
                "Account {} is not enrolled in job {}",
                account_id, job_id
            )),
            JobError::Conflict(msg) => ApiError::Conflict(msg),
            JobError::InvalidState(msg) => ApiError::BadRequest(msg),
            JobError::ValidationError(msg) => ApiError::BadRequest(msg),
            JobError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<account_service::AccountError> for ApiError {
    fn from(err: account_service::AccountError) -> Self {
        use account_service::AccountError;

        match err {
            AccountError::NotFound(id) => ApiError::NotFound(format!("Account {} not found", id)),
            AccountError::CategoryNotFound(id) => {
                ApiError::NotFound(format!("Category {} not found", id))
            }
            AccountError::AlreadyExists(msg) => ApiError::Conflict(msg),
            AccountError::ValidationError(msg) => ApiError::BadRequest(msg),
            AccountError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
