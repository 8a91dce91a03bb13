//! Error types for botpulse-core

use thiserror::Error;

/// Main error type for the botpulse-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Result type alias for botpulse-core
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single health-gated fetch attempt.
///
/// The `Display` output is the user-visible reason that ends up in the
/// status line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The liveness probe failed, the analytics endpoint was never called.
    #[error("API service is not available")]
    HealthUnavailable,

    /// The analytics endpoint answered with a non-success status.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The body was absent, not JSON, or not an analytics object.
    #[error("Invalid data format received")]
    InvalidPayload,

    /// Transport failure (connection refused, timeout, ...).
    #[error("{0}")]
    Network(String),
}

impl FetchError {
    /// Build a server error, preferring the message the server sent.
    pub fn server(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Server error: {}", status));
        FetchError::Server { status, message }
    }

    /// Status line shown while another attempt is pending.
    pub fn retrying_message(&self, next_attempt: u32, max_attempts: u32) -> String {
        format!("{} - Retrying... ({}/{})", self, next_attempt, max_attempts)
    }

    /// Status line shown once the retry budget is spent.
    pub fn exhausted_message(&self) -> String {
        format!("{} - Max retries reached. Please try again later.", self)
    }
}
