//! Insights error types.

use thiserror::Error;

/// Insights error type.
#[derive(Error, Debug)]
pub enum InsightsError {
    /// HTTP request error (connection, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Analytics API answered with a non-success status
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error while saving an export
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown range, format or interval name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using InsightsError.
pub type InsightsResult<T> = Result<T, InsightsError>;

impl From<beacon_config_and_utils::CoreError> for InsightsError {
    fn from(err: beacon_config_and_utils::CoreError) -> Self {
        InsightsError::Config(err.to_string())
    }
}
