//! Event sequence checker shared by the state machine and controller tests
//!
//! Accepts exactly the orderings a client may observe:
//!
//! ```text
//! RUN_ERROR
//! RUN_STARTED RUN_ERROR
//! RUN_STARTED TEXT_MESSAGE_START CONTENT* RUN_ERROR
//! RUN_STARTED TEXT_MESSAGE_START CONTENT* TEXT_MESSAGE_END (RUN_ERROR | MESSAGES_SNAPSHOT (RUN_FINISHED | RUN_ERROR))
//! ```
//!
//! plus any prefix of those when the stream was cut short.

use crate::protocol::{Event, EventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    Started,
    MessageOpen,
    MessageClosed,
    Snapshot,
    Terminal,
}

/// Check ordering, id correlation and the terminal rule. `Ok` for valid
/// prefixes too; use [`check_complete_run`] to also require a terminal event.
pub fn check_event_order(events: &[Event]) -> Result<(), String> {
    let mut phase = Phase::Empty;
    let mut run_ids: Option<(String, String)> = None;
    let mut message_id: Option<String> = None;

    for (i, event) in events.iter().enumerate() {
        let kind = event.kind();
        let next = match (phase, kind) {
            (Phase::Empty, EventKind::RunStarted) => Phase::Started,
            (Phase::Started, EventKind::TextMessageStart) => Phase::MessageOpen,
            (Phase::MessageOpen, EventKind::TextMessageContent) => Phase::MessageOpen,
            (Phase::MessageOpen, EventKind::TextMessageEnd) => Phase::MessageClosed,
            (Phase::MessageClosed, EventKind::MessagesSnapshot) => Phase::Snapshot,
            (Phase::Snapshot, EventKind::RunFinished) => Phase::Terminal,
            (Phase::Terminal, _) => {
                return Err(format!("event {i} ({}) follows the terminal event", kind.as_str()))
            }
            (_, EventKind::RunError) => Phase::Terminal,
            (phase, kind) => {
                return Err(format!(
                    "event {i} ({}) not allowed after {phase:?}",
                    kind.as_str()
                ))
            }
        };

        if let Some((thread_id, run_id)) = event.run_ids() {
            match &run_ids {
                None => run_ids = Some((thread_id.to_string(), run_id.to_string())),
                Some((t, r)) if t == thread_id && r == run_id => {}
                Some((t, r)) => {
                    return Err(format!(
                        "event {i} ({}) carries ids {thread_id}/{run_id}, run started as {t}/{r}",
                        kind.as_str()
                    ))
                }
            }
        } else if kind == EventKind::RunError && phase != Phase::Empty {
            return Err(format!("RUN_ERROR at {i} dropped the run ids"));
        }

        if let Some(id) = event.message_id() {
            match &message_id {
                None => message_id = Some(id.to_string()),
                Some(expected) if expected == id => {}
                Some(expected) => {
                    return Err(format!(
                        "event {i} ({}) has messageId {id}, expected {expected}",
                        kind.as_str()
                    ))
                }
            }
        }

        phase = next;
    }

    Ok(())
}

/// Like [`check_event_order`] but the sequence must end in a terminal event
pub fn check_complete_run(events: &[Event]) -> Result<(), String> {
    check_event_order(events)?;
    match events.last() {
        Some(last) if last.is_terminal() => Ok(()),
        Some(last) => Err(format!("run ended on {}", last.kind().as_str())),
        None => Err("no events".to_string()),
    }
}

/// Concatenated deltas of all `TEXT_MESSAGE_CONTENT` events
pub fn streamed_text(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            Event::TextMessageContent { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

pub fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(Event::kind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ErrorPayload, Role};

    fn started(run: &str) -> Event {
        Event::RunStarted {
            thread_id: "t".to_string(),
            run_id: run.to_string(),
        }
    }

    fn error(ids: bool) -> Event {
        Event::RunError {
            thread_id: ids.then(|| "t".to_string()),
            run_id: ids.then(|| "r".to_string()),
            error: ErrorPayload {
                message: "x".to_string(),
                code: None,
            },
        }
    }

    fn open(message_id: &str) -> Event {
        Event::TextMessageStart {
            message_id: message_id.to_string(),
            role: Role::Assistant,
        }
    }

    #[test]
    fn test_accepts_lone_error() {
        assert!(check_complete_run(&[error(false)]).is_ok());
    }

    #[test]
    fn test_accepts_error_after_message_start() {
        assert!(check_complete_run(&[started("r"), open("m"), error(true)]).is_ok());
    }

    #[test]
    fn test_rejects_events_after_terminal() {
        let events = [started("r"), error(true), open("m")];
        assert!(check_event_order(&events).is_err());
    }

    #[test]
    fn test_rejects_mismatched_run_ids() {
        let events = [
            started("r"),
            open("m"),
            Event::TextMessageEnd {
                message_id: "m".to_string(),
            },
            Event::MessagesSnapshot {
                thread_id: "t".to_string(),
                run_id: "other".to_string(),
                messages: vec![],
            },
        ];
        assert!(check_event_order(&events).is_err());
    }

    #[test]
    fn test_rejects_mismatched_message_ids() {
        let events = [
            started("r"),
            open("m"),
            Event::TextMessageContent {
                message_id: "n".to_string(),
                delta: "x".to_string(),
            },
        ];
        assert!(check_event_order(&events).is_err());
    }

    #[test]
    fn test_rejects_error_without_ids_after_start() {
        assert!(check_event_order(&[started("r"), error(false)]).is_err());
    }

    #[test]
    fn test_incomplete_prefix() {
        let events = [started("r"), open("m")];
        assert!(check_event_order(&events).is_ok());
        assert!(check_complete_run(&events).is_err());
    }
}
