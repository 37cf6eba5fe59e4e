//! Error types for exo-vision
//!
//! Every handler error becomes a JSON body:
//! `{ "error": { "code": "...", "message": "..." } }`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use exo_common::batch::BatchError;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload lacks required columns (400)
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Request not valid in the current state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Feature disabled because its artifacts failed to load (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<exo_common::Error> for ApiError {
    fn from(err: exo_common::Error) -> Self {
        match err {
            exo_common::Error::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            exo_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            exo_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::MissingColumns(columns) => ApiError::MissingColumns(columns),
            BatchError::Malformed(msg) => ApiError::BadRequest(format!("Malformed CSV: {}", msg)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::MissingColumns(_) => (StatusCode::BAD_REQUEST, "MISSING_COLUMNS"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::Internal(_) | ApiError::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let ApiError::MissingColumns(columns) = &self {
            error["missing_columns"] = json!(columns);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
