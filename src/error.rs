//! Error types for the SMA price tracker

use thiserror::Error;

/// Errors produced while tracking a coin
///
/// Every variant maps onto an [`ErrorKind`]; the retrier only ever looks at the
/// kind to decide between retrying and giving up.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Network request failed before a response arrived
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body was not valid JSON
    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    /// Provider does not know the requested coin
    #[error("Coin not found: {0}")]
    NotFound(String),

    /// JSON payload is missing the expected fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Shutdown was requested before the call could be issued
    #[error("Shutdown requested, aborting fetch")]
    ShutdownRequested,

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification used by the retrier and the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Presumed temporary, eligible for retry
    Transient,
    /// Unknown coin identifier
    NotFound,
    /// Cooperative cancellation
    ShutdownRequested,
    /// Unexpected payload shape
    MalformedResponse,
    /// Rejected configuration
    InvalidConfig,
}

impl TrackerError {
    /// Creates an Api error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a MalformedResponse error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Creates an InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Api { .. } | Self::InvalidBody(_) => ErrorKind::Transient,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::ShutdownRequested => ErrorKind::ShutdownRequested,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Returns true if the failure should be retried
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_shutdown(&self) -> bool {
        self.kind() == ErrorKind::ShutdownRequested
    }

    /// Human-readable message used by the periodic retry diagnostics
    ///
    /// Api errors already carry the provider's own error message when the body
    /// had one, so the status code is left out.
    pub fn diagnostic_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
