//! Run controller
//!
//! Entry point for one run: validates the request, then hands the transport
//! a stream of framed records that advances the state machine as it is
//! polled.

mod session;

pub use session::RunSession;

use crate::chunker::ChunkPolicy;
use crate::config::ServerConfig;
use crate::framer::{Framer, SseFramer};
use crate::generation::GenerationAdapter;
use crate::ids::{IdAllocator, UuidAllocator};
use crate::protocol::RunRequest;
use crate::run::{RunContext, ValidationError};
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-run tunables
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Deadline for the backend to answer
    pub generation_timeout: Duration,
    /// Pause between successive deltas. Zero streams as fast as the client
    /// reads.
    pub chunk_delay: Duration,
    pub chunk_policy: ChunkPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(120),
            chunk_delay: Duration::from_millis(50),
            chunk_policy: ChunkPolicy::Words,
        }
    }
}

impl From<&ServerConfig> for RunSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            generation_timeout: config.generation_timeout,
            chunk_delay: config.chunk_delay,
            chunk_policy: config.chunk_policy,
        }
    }
}

/// Starts runs against one generation backend
///
/// Cheap to clone; every run gets its own [`RunSession`] and shares nothing
/// mutable with other runs.
#[derive(Clone)]
pub struct RunController {
    adapter: Arc<dyn GenerationAdapter>,
    ids: Arc<dyn IdAllocator>,
    framer: Arc<dyn Framer>,
    settings: RunSettings,
    shutdown: CancellationToken,
}

impl RunController {
    pub fn new(adapter: Arc<dyn GenerationAdapter>, settings: RunSettings) -> Self {
        Self {
            adapter,
            ids: Arc::new(UuidAllocator),
            framer: Arc::new(SseFramer),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_framer(mut self, framer: Arc<dyn Framer>) -> Self {
        self.framer = framer;
        self
    }

    /// Runs in flight end with `RUN_ERROR` once this token is cancelled
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn GenerationAdapter> {
        &self.adapter
    }

    /// Start a run from a raw JSON body. A body that does not parse still
    /// gets a stream: a single `RUN_ERROR`.
    pub fn start_from_body(&self, body: &[u8]) -> RunSession {
        match parse_request(body) {
            Ok(request) => self.start(request),
            Err(error) => {
                let (thread_id, run_id) = salvage_ids(body);
                tracing::warn!(error = %error, "Rejecting malformed run request");
                self.session(
                    RunContext::default().with_supplied_ids(thread_id, run_id),
                    Some(error),
                )
            }
        }
    }

    /// Start a run from a parsed request
    pub fn start(&self, request: RunRequest) -> RunSession {
        let rejection = validate(&request).err();
        let context = RunContext::new(request.messages)
            .with_supplied_ids(request.thread_id, request.run_id);
        self.session(context, rejection)
    }

    /// Convenience for transports: start from a body and stream records
    pub fn stream_body(&self, body: &[u8]) -> impl Stream<Item = Bytes> + Send + 'static {
        self.start_from_body(body).into_stream()
    }

    fn session(&self, context: RunContext, rejection: Option<ValidationError>) -> RunSession {
        RunSession::new(
            context,
            rejection,
            self.adapter.clone(),
            self.ids.clone(),
            self.framer.clone(),
            self.settings.clone(),
            self.shutdown.clone(),
        )
    }
}

pub fn parse_request(body: &[u8]) -> Result<RunRequest, ValidationError> {
    serde_json::from_slice(body).map_err(|e| ValidationError::Malformed(e.to_string()))
}

pub fn validate(request: &RunRequest) -> Result<(), ValidationError> {
    if request.messages.is_empty() {
        return Err(ValidationError::NoMessages);
    }
    Ok(())
}

/// Pull `threadId`/`runId` out of a body that failed to parse as a request,
/// so the error can still be correlated
fn salvage_ids(body: &[u8]) -> (Option<String>, Option<String>) {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
        return (None, None);
    };
    let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
    (field("threadId"), field("runId"))
}
