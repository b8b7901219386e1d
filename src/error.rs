//! Error kinds shared by every attribution operation.
//!
//! Each kind maps to one HTTP status. Handlers return `Result<_, TrackerError>`
//! and let [`IntoResponse`] render the body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failure of a tracking, attribution or reporting operation.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Malformed or missing required input.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Unresolvable token, click, visitor or campaign.
    #[error("not found: {0}")]
    NotFound(String),

    /// Token collision on campaign creation, or delete of a referenced campaign.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store rejected or failed a statement.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Any other server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    /// HTTP status for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            TrackerError::Invalid(_) => StatusCode::BAD_REQUEST,
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::Conflict(_) => StatusCode::CONFLICT,
            TrackerError::Storage(_) | TrackerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True when a statement failed on a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            TrackerError::Storage(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// True when a statement failed on a FOREIGN KEY constraint.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            TrackerError::Storage(sqlx::Error::Database(db)) => db.is_foreign_key_violation(),
            _ => false,
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "error": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
