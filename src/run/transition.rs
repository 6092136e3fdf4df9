//! Pure state transition function
//!
//! Given the same state, context and input this always produces the same
//! new state and effects. All I/O lives in the controller.

use super::failure::RunFailure;
use super::{Effect, RunContext, RunIds, RunInput, RunState};
use crate::generation::GenerationRequest;
use crate::protocol::{Event, Message, Role};
use std::sync::Arc;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: RunState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: RunState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn emit(self, event: Event) -> Self {
        self.with_effect(Effect::Emit(event))
    }

    /// Events among the effects, in emission order
    #[cfg(test)]
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.effects.iter().filter_map(Effect::as_event)
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Run has already ended")]
    RunClosed,
    #[error("Cannot start a run without messages")]
    EmptyConversation,
    #[error("Invalid transition: {input} while {state}")]
    InvalidTransition {
        state: &'static str,
        input: &'static str,
    },
    #[error("Delta {delta:?} does not continue the generated text")]
    DeltaMismatch { delta: String },
    #[error("Message ended after {streamed} of {generated} bytes")]
    IncompleteMessage { streamed: usize, generated: usize },
}

/// Pure transition function
pub fn transition(
    state: &RunState,
    context: &RunContext,
    input: RunInput,
) -> Result<TransitionResult, TransitionError> {
    if state.is_terminal() {
        return Err(TransitionError::RunClosed);
    }

    match (state, input) {
        // Any fault ends the run with exactly one RUN_ERROR
        (_, RunInput::Fail { failure }) => Ok(fail(state, context, &failure)),

        (RunState::Init, RunInput::Start { ids }) => {
            if context.messages.is_empty() {
                return Err(TransitionError::EmptyConversation);
            }
            let started = Event::RunStarted {
                thread_id: ids.thread_id.clone(),
                run_id: ids.run_id.clone(),
            };
            Ok(TransitionResult::new(RunState::Started { ids }).emit(started))
        }

        (RunState::Started { ids }, RunInput::OpenMessage { message_id }) => {
            let request = GenerationRequest::from_messages(&context.messages)
                .ok_or(TransitionError::EmptyConversation)?;
            Ok(TransitionResult::new(RunState::Streaming {
                ids: ids.clone(),
                message_id: message_id.clone(),
                generated: None,
                streamed: 0,
            })
            .emit(Event::TextMessageStart {
                message_id,
                role: Role::Assistant,
            })
            .with_effect(Effect::RequestGeneration(request)))
        }

        (
            RunState::Streaming {
                ids,
                message_id,
                generated: None,
                streamed,
            },
            RunInput::Generated { text },
        ) => Ok(TransitionResult::new(RunState::Streaming {
            ids: ids.clone(),
            message_id: message_id.clone(),
            generated: Some(Arc::from(text.as_str())),
            streamed: *streamed,
        })
        .with_effect(Effect::StreamText { text })),

        (
            RunState::Streaming {
                ids,
                message_id,
                generated: Some(generated),
                streamed,
            },
            RunInput::Delta { delta },
        ) => {
            let continues = generated
                .get(*streamed..)
                .is_some_and(|rest| rest.starts_with(delta.as_str()));
            if delta.is_empty() || !continues {
                return Err(TransitionError::DeltaMismatch { delta });
            }
            Ok(TransitionResult::new(RunState::Streaming {
                ids: ids.clone(),
                message_id: message_id.clone(),
                generated: Some(Arc::clone(generated)),
                streamed: streamed + delta.len(),
            })
            .emit(Event::TextMessageContent {
                message_id: message_id.clone(),
                delta,
            }))
        }

        (
            RunState::Streaming {
                ids,
                message_id,
                generated: Some(generated),
                streamed,
            },
            RunInput::Complete,
        ) => {
            if *streamed != generated.len() {
                return Err(TransitionError::IncompleteMessage {
                    streamed: *streamed,
                    generated: generated.len(),
                });
            }

            let mut messages = context.messages.clone();
            messages.push(Message::assistant(generated.to_string()).with_id(message_id.clone()));

            Ok(
                TransitionResult::new(RunState::SnapshotReady { ids: ids.clone() })
                    .emit(Event::TextMessageEnd {
                        message_id: message_id.clone(),
                    })
                    .emit(Event::MessagesSnapshot {
                        thread_id: ids.thread_id.clone(),
                        run_id: ids.run_id.clone(),
                        messages,
                    }),
            )
        }

        (RunState::SnapshotReady { ids }, RunInput::Finish) => Ok(TransitionResult::new(
            RunState::Finished { ids: ids.clone() },
        )
        .emit(Event::RunFinished {
            thread_id: ids.thread_id.clone(),
            run_id: ids.run_id.clone(),
        })),

        (state, input) => Err(TransitionError::InvalidTransition {
            state: state.name(),
            input: input_name(&input),
        }),
    }
}

/// `* -> Errored`. Carries whatever ids are bound; before `RUN_STARTED`
/// that is only what the caller supplied.
fn fail(state: &RunState, context: &RunContext, failure: &RunFailure) -> TransitionResult {
    let (thread_id, run_id) = match state.ids() {
        Some(RunIds { thread_id, run_id }) => (Some(thread_id.clone()), Some(run_id.clone())),
        None => (
            context.supplied_thread_id.clone(),
            context.supplied_run_id.clone(),
        ),
    };

    TransitionResult::new(RunState::Errored {
        thread_id: thread_id.clone(),
        run_id: run_id.clone(),
        message: failure.to_string(),
    })
    .emit(Event::RunError {
        thread_id,
        run_id,
        error: failure.to_payload(),
    })
}

fn input_name(input: &RunInput) -> &'static str {
    match input {
        RunInput::Start { .. } => "start",
        RunInput::OpenMessage { .. } => "open_message",
        RunInput::Generated { .. } => "generated",
        RunInput::Delta { .. } => "delta",
        RunInput::Complete => "complete",
        RunInput::Finish => "finish",
        RunInput::Fail { .. } => "fail",
    }
}
