//! Lifecycle events streamed to the client

use super::types::{Message, Role};
use serde::{Deserialize, Serialize};

/// AG-UI lifecycle events for one run
///
/// Serialized internally tagged by `type`; field names are camelCase on the
/// wire. The timestamp is added by [`StampedEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    RunStarted {
        thread_id: String,
        run_id: String,
    },
    TextMessageStart {
        message_id: String,
        role: Role,
    },
    TextMessageContent {
        message_id: String,
        delta: String,
    },
    TextMessageEnd {
        message_id: String,
    },
    MessagesSnapshot {
        thread_id: String,
        run_id: String,
        messages: Vec<Message>,
    },
    RunFinished {
        thread_id: String,
        run_id: String,
    },
    /// Terminal failure. Ids are absent when the run failed before they
    /// were known.
    RunError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        error: ErrorPayload,
    },
}

/// Body of a `RUN_ERROR` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Discriminant of [`Event`], for ordering checks and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStarted,
    TextMessageStart,
    TextMessageContent,
    TextMessageEnd,
    MessagesSnapshot,
    RunFinished,
    RunError,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RunStarted => "RUN_STARTED",
            EventKind::TextMessageStart => "TEXT_MESSAGE_START",
            EventKind::TextMessageContent => "TEXT_MESSAGE_CONTENT",
            EventKind::TextMessageEnd => "TEXT_MESSAGE_END",
            EventKind::MessagesSnapshot => "MESSAGES_SNAPSHOT",
            EventKind::RunFinished => "RUN_FINISHED",
            EventKind::RunError => "RUN_ERROR",
        }
    }

    #[cfg(test)]
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::RunFinished | EventKind::RunError)
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RunStarted { .. } => EventKind::RunStarted,
            Event::TextMessageStart { .. } => EventKind::TextMessageStart,
            Event::TextMessageContent { .. } => EventKind::TextMessageContent,
            Event::TextMessageEnd { .. } => EventKind::TextMessageEnd,
            Event::MessagesSnapshot { .. } => EventKind::MessagesSnapshot,
            Event::RunFinished { .. } => EventKind::RunFinished,
            Event::RunError { .. } => EventKind::RunError,
        }
    }

    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Run correlation ids carried by this event, if any
    #[cfg(test)]
    pub fn run_ids(&self) -> Option<(&str, &str)> {
        match self {
            Event::RunStarted { thread_id, run_id }
            | Event::MessagesSnapshot {
                thread_id, run_id, ..
            }
            | Event::RunFinished { thread_id, run_id } => Some((thread_id, run_id)),
            Event::RunError {
                thread_id: Some(thread_id),
                run_id: Some(run_id),
                ..
            } => Some((thread_id, run_id)),
            _ => None,
        }
    }

    /// Message id carried by `TEXT_MESSAGE_*` events
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Event::TextMessageStart { message_id, .. }
            | Event::TextMessageContent { message_id, .. }
            | Event::TextMessageEnd { message_id } => Some(message_id),
            _ => None,
        }
    }
}

/// Event as it goes on the wire: the variant plus its emission time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedEvent {
    #[serde(flatten)]
    pub event: Event,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl StampedEvent {
    pub fn new(event: Event, timestamp: u64) -> Self {
        Self { event, timestamp }
    }
}
