//! Error types for the query pipeline.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.

use crate::guard::InputRejection;
use crate::sql::SqlRejection;
use thiserror::Error;

/// Generic message shown to end users for any pipeline failure.
///
/// Internal detail (validator reasons, raw database errors) never leaves the
/// service through this text.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "An error occurred while processing your query. Please try again.";

/// Generic message shown to end users when input is rejected.
pub const REJECTED_INPUT_MESSAGE: &str =
    "Invalid or potentially malicious input detected. Please rephrase your question.";

/// Error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum NlqError {
    /// Input guard rejected the natural-language query
    #[error("Input rejected: {0}")]
    RejectedInput(InputRejection),

    /// Translation model returned nothing usable
    #[error("Translation failed: {0}")]
    TranslationFailure(String),

    /// Every model/retry combination failed
    #[error("Generation exhausted after {} attempts", attempts.len())]
    GenerationExhausted {
        /// Ordered failure history, one entry per attempt
        attempts: Vec<String>,
    },

    /// SQL validator refused a candidate statement
    #[error("SQL rejected: {0}")]
    ValidationRejected(SqlRejection),

    /// Database refused an already-validated statement
    #[error("Query execution failed: {0}")]
    ExecutionError(String),

    /// Generation or database backend unreachable
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client error (generation backend)
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Database driver error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl NlqError {
    /// Create an execution error with context.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a backend error with context.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Check if error is recoverable.
    ///
    /// Recoverable errors are handled inside the fallback loop by advancing
    /// to the next attempt; everything else surfaces to the caller.
    ///
    /// # Returns
    ///
    /// `true` if the attempt can be retried, `false` otherwise
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ValidationRejected(_)
                | Self::ExecutionError(_)
                | Self::BackendUnavailable(_)
                | Self::HttpError(_)
                | Self::DatabaseError(_)
        )
    }

    /// Message safe to show an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RejectedInput(_) => REJECTED_INPUT_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

impl From<InputRejection> for NlqError {
    fn from(rejection: InputRejection) -> Self {
        Self::RejectedInput(rejection)
    }
}

impl From<SqlRejection> for NlqError {
    fn from(rejection: SqlRejection) -> Self {
        Self::ValidationRejected(rejection)
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, NlqError>;
