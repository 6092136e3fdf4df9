//! Inputs that drive a run forward

use super::failure::RunFailure;
use super::state::RunIds;

/// Inputs that trigger state transitions
#[derive(Debug, Clone)]
pub enum RunInput {
    /// Request validated and ids resolved
    Start { ids: RunIds },

    /// Open the assistant message and ask the backend for a reply
    OpenMessage { message_id: String },

    /// Backend produced the full reply
    Generated { text: String },

    /// Next fragment of the reply
    Delta { delta: String },

    /// Every fragment has been emitted
    Complete,

    /// Close the run successfully
    Finish,

    /// Any fault, at any stage
    Fail { failure: RunFailure },
}

impl RunInput {
    pub fn fail(failure: impl Into<RunFailure>) -> Self {
        RunInput::Fail {
            failure: failure.into(),
        }
    }
}
