/// Unified error types for the Matchday club server
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the club server
#[derive(Error, Debug)]
pub enum ClubError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors (role or ownership denial)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors (bad input shape, missing requestId, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g. duplicate idempotency marker under race)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A query needed a composite index that is not provisioned yet.
    /// The auto-close engine catches this and falls back to a full scan;
    /// it never surfaces as a run failure.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ClubError to HTTP response
impl IntoResponse for ClubError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ClubError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            ClubError::Authorization(_) => {
                (StatusCode::FORBIDDEN, "Forbidden", self.to_string())
            }
            ClubError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            ClubError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            ClubError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            ClubError::IndexUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PreconditionFailed",
                self.to_string(),
            ),
            ClubError::Database(_) | ClubError::Internal(_) | ClubError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for club server operations
pub type ClubResult<T> = Result<T, ClubError>;
