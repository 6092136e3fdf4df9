//! Generation error types

use std::time::Duration;
use thiserror::Error;

/// Generation failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::InvalidRequest, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::MalformedResponse, message)
    }

    pub fn timeout(deadline: Duration) -> Self {
        Self::new(
            GenerationErrorKind::Timeout,
            format!("Generation timed out after {}s", deadline.as_secs_f64()),
        )
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Unknown, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Connection failures, dropped responses
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403)
    Auth,
    /// Bad request (400, 404 unknown model)
    InvalidRequest,
    /// Backend answered but the body was unusable
    MalformedResponse,
    /// Deadline expired before the backend answered
    Timeout,
    Unknown,
}

impl GenerationErrorKind {
    /// Transient failures a caller could reasonably try again
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::RateLimit | Self::ServerError | Self::Timeout
        )
    }
}
