//! Property-based tests for the run state machine
//!
//! These drive the machine with arbitrary input sequences, rejecting
//! illegal inputs the way the controller does, and check that every
//! observable event sequence is well formed.

use super::conformance::{check_complete_run, check_event_order, kinds, streamed_text};
use super::*;
use crate::chunker::ChunkPolicy;
use crate::generation::GenerationError;
use crate::protocol::{Event, EventKind, Message};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(messages: usize) -> RunContext {
    let messages = (0..messages)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {i}"))
            } else {
                Message::assistant(format!("answer {i}"))
            }
        })
        .collect();
    RunContext::new(messages)
}

/// Apply inputs the way the controller does: an illegal input becomes a
/// protocol failure, and nothing is applied once the run is terminal.
fn drive(context: &RunContext, inputs: Vec<RunInput>) -> (RunState, Vec<Event>) {
    let mut state = RunState::Init;
    let mut events = Vec::new();

    for input in inputs {
        if state.is_terminal() {
            break;
        }
        let result = match transition(&state, context, input) {
            Ok(result) => result,
            Err(e) => transition(&state, context, RunInput::fail(RunFailure::Protocol(e.to_string())))
                .expect("fail is accepted in every non-terminal state"),
        };
        events.extend(result.events().cloned());
        state = result.new_state;
    }

    (state, events)
}

/// The input sequence a healthy run goes through
fn happy_inputs(text: &str) -> Vec<RunInput> {
    let mut inputs = vec![
        RunInput::Start {
            ids: RunIds::new("thread", "run"),
        },
        RunInput::OpenMessage {
            message_id: "msg".to_string(),
        },
        RunInput::Generated {
            text: text.to_string(),
        },
    ];
    inputs.extend(ChunkPolicy::Words.chunks(text).map(|delta| RunInput::Delta {
        delta: delta.to_string(),
    }));
    inputs.push(RunInput::Complete);
    inputs.push(RunInput::Finish);
    inputs
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_failure() -> impl Strategy<Value = RunFailure> {
    prop_oneof![
        Just(RunFailure::Validation(ValidationError::NoMessages)),
        "[a-z ]{1,20}".prop_map(|m| RunFailure::Generation(GenerationError::server_error(m))),
        "[a-z ]{1,20}".prop_map(RunFailure::Serialization),
        Just(RunFailure::Cancelled),
    ]
}

fn arb_input() -> impl Strategy<Value = RunInput> {
    prop_oneof![
        Just(RunInput::Start {
            ids: RunIds::new("thread", "run")
        }),
        "[a-z]{1,4}".prop_map(|id| RunInput::OpenMessage { message_id: id }),
        "[a-z ]{0,20}".prop_map(|text| RunInput::Generated { text }),
        "[a-z ]{0,5}".prop_map(|delta| RunInput::Delta { delta }),
        Just(RunInput::Complete),
        Just(RunInput::Finish),
        arb_failure().prop_map(|failure| RunInput::Fail { failure }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Whatever inputs arrive, the client sees a valid ordering
    #[test]
    fn arbitrary_inputs_yield_valid_sequences(
        messages in 0usize..4,
        inputs in proptest::collection::vec(arb_input(), 0..30),
    ) {
        let (_, events) = drive(&test_context(messages), inputs);
        if let Err(e) = check_event_order(&events) {
            prop_assert!(false, "{e}: {:?}", kinds(&events));
        }
    }

    /// At most one terminal event, and it is always last
    #[test]
    fn terminal_event_is_unique_and_last(
        messages in 0usize..4,
        inputs in proptest::collection::vec(arb_input(), 0..30),
    ) {
        let (state, events) = drive(&test_context(messages), inputs);
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        prop_assert!(terminals <= 1);
        if terminals == 1 {
            prop_assert!(events.last().unwrap().is_terminal());
            prop_assert!(state.is_terminal());
        }
    }

    /// A healthy run streams the reply exactly and finishes
    #[test]
    fn happy_path_reproduces_reply(messages in 1usize..5, text in "[a-zA-Z ,.\n]{0,80}") {
        let context = test_context(messages);
        let (state, events) = drive(&context, happy_inputs(&text));

        prop_assert!(
            matches!(state, RunState::Finished { .. }),
            "expected finished, got {:?}",
            state
        );
        prop_assert!(check_complete_run(&events).is_ok());
        prop_assert_eq!(streamed_text(&events), text.clone());

        let snapshot = events.iter().find_map(|e| match e {
            Event::MessagesSnapshot { messages, .. } => Some(messages.clone()),
            _ => None,
        });
        let snapshot = snapshot.unwrap();
        prop_assert_eq!(snapshot.len(), messages + 1);
        prop_assert_eq!(&snapshot[..messages], &context.messages[..]);
        prop_assert_eq!(snapshot.last().unwrap().content.clone(), text);
    }

    /// Failing at any point of a healthy run ends it with RUN_ERROR and no
    /// TEXT_MESSAGE_END for an unfinished message
    #[test]
    fn failure_at_any_step_is_terminal(
        text in "[a-z ]{1,40}",
        cut in 0usize..20,
        failure in arb_failure(),
    ) {
        let mut inputs = happy_inputs(&text);
        let cut = cut.min(inputs.len() - 1);
        inputs.truncate(cut);
        inputs.push(RunInput::Fail { failure });

        let (state, events) = drive(&test_context(1), inputs);
        prop_assert!(
            matches!(state, RunState::Errored { .. }),
            "expected errored, got {:?}",
            state
        );
        prop_assert!(check_complete_run(&events).is_ok());
        prop_assert_eq!(events.last().map(Event::kind), Some(EventKind::RunError));

        let ended = events.iter().any(|e| e.kind() == EventKind::TextMessageEnd);
        let finished_message = events.iter().any(|e| e.kind() == EventKind::MessagesSnapshot);
        prop_assert_eq!(ended, finished_message);
    }
}
