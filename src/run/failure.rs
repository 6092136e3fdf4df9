//! Run failure taxonomy and its mapping onto `RUN_ERROR`

use crate::generation::{GenerationError, GenerationErrorKind};
use crate::protocol::ErrorPayload;
use thiserror::Error;

/// Why a run request was rejected before it started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No messages provided")]
    NoMessages,
    #[error("Invalid run request: {0}")]
    Malformed(String),
}

/// Every way a run can end in `RUN_ERROR`
#[derive(Debug, Clone, Error)]
pub enum RunFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Failed to encode event: {0}")]
    Serialization(String),

    #[error("Run cancelled: server is shutting down")]
    Cancelled,

    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl RunFailure {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            RunFailure::Validation(_) => "VALIDATION",
            RunFailure::Generation(e) if e.kind == GenerationErrorKind::Timeout => {
                "GENERATION_TIMEOUT"
            }
            RunFailure::Generation(_) => "GENERATION_FAILED",
            RunFailure::Serialization(_) => "SERIALIZATION",
            RunFailure::Cancelled => "CANCELLED",
            RunFailure::Protocol(_) => "PROTOCOL",
        }
    }

    /// The single place a failure becomes a client-visible error body
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            message: self.to_string(),
            code: Some(self.code().to_string()),
        }
    }
}
