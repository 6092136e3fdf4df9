//! AG-UI wire protocol types
//!
//! Inbound run requests and the outbound lifecycle events streamed back to
//! the client.

mod event;
mod types;

pub use event::{ErrorPayload, Event, EventKind, StampedEvent};
pub use types::{Message, Role, RunRequest};
