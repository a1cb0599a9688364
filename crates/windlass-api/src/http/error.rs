//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use windlass_core::service::ServiceError;

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Resource does not exist.
    NotFound(String),
    /// Request conflicts with current state (e.g. cancelling a terminal
    /// execution).
    Conflict(String),
    /// Malformed request.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::WorkflowNotFound(name) => {
                AppError::NotFound(format!("workflow '{name}' not found"))
            }
            ServiceError::ExecutionNotFound(id) => {
                AppError::NotFound(format!("execution {id} not found"))
            }
            ServiceError::Store(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!(error = msg.as_str(), "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    msg.clone(),
                )
            }
        };

        (status, Json(ApiResponse::error(code, &message))).into_response()
    }
}
