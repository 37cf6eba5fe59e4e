//! Common error types for ExoVision

use thiserror::Error;

/// Common result type for ExoVision operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the service
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON artifact could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV input could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// State machine transition not allowed from the current state
    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
