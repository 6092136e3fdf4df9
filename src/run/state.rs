//! Run protocol state types

use crate::protocol::Message;
use std::sync::Arc;

/// Correlation ids shared by every event of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIds {
    pub thread_id: String,
    pub run_id: String,
}

impl RunIds {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Where a run is in its event sequence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    /// Nothing emitted yet
    #[default]
    Init,

    /// `RUN_STARTED` emitted
    Started { ids: RunIds },

    /// `TEXT_MESSAGE_START` emitted for `message_id`
    Streaming {
        ids: RunIds,
        message_id: String,
        /// Full reply, once the backend has produced it
        generated: Option<Arc<str>>,
        /// Byte length of the reply prefix already sent as deltas
        streamed: usize,
    },

    /// `TEXT_MESSAGE_END` and `MESSAGES_SNAPSHOT` emitted
    SnapshotReady { ids: RunIds },

    /// `RUN_FINISHED` emitted (terminal)
    Finished { ids: RunIds },

    /// `RUN_ERROR` emitted (terminal), with the ids it carried
    Errored {
        thread_id: Option<String>,
        run_id: Option<String>,
        message: String,
    },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Finished { .. } | RunState::Errored { .. })
    }

    /// Ids bound so far. `None` before `RUN_STARTED` and after an error.
    pub fn ids(&self) -> Option<&RunIds> {
        match self {
            RunState::Started { ids }
            | RunState::Streaming { ids, .. }
            | RunState::SnapshotReady { ids }
            | RunState::Finished { ids } => Some(ids),
            RunState::Init | RunState::Errored { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::Started { .. } => "started",
            RunState::Streaming { .. } => "streaming",
            RunState::SnapshotReady { .. } => "snapshot_ready",
            RunState::Finished { .. } => "finished",
            RunState::Errored { .. } => "errored",
        }
    }
}

/// Immutable inputs of one run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Conversation as sent by the caller
    pub messages: Vec<Message>,
    /// Ids the caller brought along, echoed on early failures
    pub supplied_thread_id: Option<String>,
    pub supplied_run_id: Option<String>,
}

impl RunContext {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            supplied_thread_id: None,
            supplied_run_id: None,
        }
    }

    #[must_use]
    pub fn with_supplied_ids(mut self, thread_id: Option<String>, run_id: Option<String>) -> Self {
        self.supplied_thread_id = thread_id;
        self.supplied_run_id = run_id;
        self
    }
}
