//! Effects produced by state transitions

use crate::generation::GenerationRequest;
use crate::protocol::Event;

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send an event to the client
    Emit(Event),

    /// Call the generation backend
    RequestGeneration(GenerationRequest),

    /// Start handing out deltas of this text
    StreamText { text: String },
}

#[cfg(test)]
impl Effect {
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Effect::Emit(event) => Some(event),
            _ => None,
        }
    }
}
