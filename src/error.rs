//! Error taxonomy: `ServiceError` for domain failures, `AppError` for HTTP.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{dao::storage::StorageError, state::session::JoinError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Session id is unknown or the session was already evicted.
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// Late join attempt against an active or finished session.
    #[error("session already started: {0}")]
    SessionAlreadyStarted(String),
    /// Malformed payload rejected at the boundary.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl ServiceError {
    /// Stable machine-readable code carried on WebSocket error frames.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unavailable(_) | ServiceError::Degraded => "storage-unavailable",
            ServiceError::SessionNotFound(_) => "session-not-found",
            ServiceError::SessionAlreadyStarted(_) => "session-already-started",
            ServiceError::InvalidEvent(_) => "invalid-event",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<JoinError> for ServiceError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::AlreadyStarted => {
                ServiceError::SessionAlreadyStarted("joins close at game start".into())
            }
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::SessionNotFound(message) => AppError::NotFound(message),
            ServiceError::SessionAlreadyStarted(message) => AppError::Conflict(message),
            ServiceError::InvalidEvent(message) => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
