//! Outbox error types.

use thiserror::Error;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// HTTP request error (connection, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ingestion endpoint answered with a non-success status
    #[error("Ingestion error: {status} - {message}")]
    Ingestion {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Send failed for a transport-specific reason
    #[error("Send failed: {0}")]
    Send(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No async runtime available to run a delivery
    #[error("No async runtime available for delivery")]
    NoRuntime,
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;

impl From<beacon_config_and_utils::CoreError> for OutboxError {
    fn from(err: beacon_config_and_utils::CoreError) -> Self {
        OutboxError::Config(err.to_string())
    }
}
