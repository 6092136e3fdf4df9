//! Server-Sent Events framing
//!
//! One event becomes one `data: <json>\n\n` record, handed to the transport
//! as a single contiguous chunk so a client never observes half a record.

use crate::protocol::{Event, StampedEvent};
use axum::http::{header, HeaderMap, HeaderValue};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

const RECORD_PREFIX: &str = "data: ";
const RECORD_TERMINATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to serialize {kind} event: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Turns stamped events into wire records
pub trait Framer: Send + Sync {
    fn encode(&self, event: &StampedEvent) -> Result<Bytes, FrameError>;
}

/// The `data: <json>\n\n` SSE framing
#[derive(Debug, Clone, Copy, Default)]
pub struct SseFramer;

impl SseFramer {
    /// Frame any serializable payload as one record
    pub fn frame<T: Serialize>(kind: &'static str, payload: &T) -> Result<Bytes, FrameError> {
        let json =
            serde_json::to_string(payload).map_err(|source| FrameError::Serialize { kind, source })?;
        let mut record = String::with_capacity(RECORD_PREFIX.len() + json.len() + 2);
        record.push_str(RECORD_PREFIX);
        record.push_str(&json);
        record.push_str(RECORD_TERMINATOR);
        Ok(Bytes::from(record))
    }
}

impl Framer for SseFramer {
    fn encode(&self, event: &StampedEvent) -> Result<Bytes, FrameError> {
        Self::frame(event.event.kind().as_str(), event)
    }
}

/// Headers every event-stream response carries
pub fn sse_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers
}

/// Stamps events with a timestamp that never goes backwards within a run
pub struct Stamper {
    last: u64,
    clock: fn() -> u64,
}

impl Stamper {
    pub fn new() -> Self {
        Self::with_clock(now_millis)
    }

    pub fn with_clock(clock: fn() -> u64) -> Self {
        Self { last: 0, clock }
    }

    pub fn stamp(&mut self, event: Event) -> StampedEvent {
        self.last = self.last.max((self.clock)());
        StampedEvent::new(event, self.last)
    }
}

impl Default for Stamper {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Parse wire records back into events. Used by tests that read a stream
/// the way a client would.
#[cfg(test)]
pub fn parse_records(wire: &str) -> Vec<StampedEvent> {
    wire.split(RECORD_TERMINATOR)
        .filter(|record| !record.is_empty())
        .map(|record| {
            let json = record
                .strip_prefix(RECORD_PREFIX)
                .unwrap_or_else(|| panic!("record without data prefix: {record:?}"));
            serde_json::from_str(json).unwrap_or_else(|e| panic!("bad record {json}: {e}"))
        })
        .collect()
}
