//! One run, driven by whoever polls it
//!
//! The session owns the run's state and advances it only when the transport
//! asks for the next record. Dropping the session (the client went away)
//! drops any in-flight backend call with it.

use super::RunSettings;
use crate::chunker::DeltaCursor;
use crate::framer::{FrameError, Framer, Stamper};
use crate::generation::{GenerationAdapter, GenerationError, GenerationRequest};
use crate::ids::{IdAllocator, IdKind};
use crate::run::{
    transition, Effect, RunContext, RunFailure, RunIds, RunInput, RunState, TransitionError,
    ValidationError,
};
use bytes::Bytes;
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct RunSession {
    state: RunState,
    context: RunContext,
    /// Set when the request was rejected before the run could start
    rejection: Option<ValidationError>,

    adapter: Arc<dyn GenerationAdapter>,
    ids: Arc<dyn IdAllocator>,
    framer: Arc<dyn Framer>,
    settings: RunSettings,
    shutdown: CancellationToken,

    stamper: Stamper,
    /// Framed records of the last transition, not yet handed out
    outbox: VecDeque<Bytes>,
    generation: Option<GenerationRequest>,
    cursor: Option<DeltaCursor>,
    deltas_sent: usize,
    started_at: Instant,
}

impl RunSession {
    pub(super) fn new(
        context: RunContext,
        rejection: Option<ValidationError>,
        adapter: Arc<dyn GenerationAdapter>,
        ids: Arc<dyn IdAllocator>,
        framer: Arc<dyn Framer>,
        settings: RunSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: RunState::Init,
            context,
            rejection,
            adapter,
            ids,
            framer,
            settings,
            shutdown,
            stamper: Stamper::new(),
            outbox: VecDeque::new(),
            generation: None,
            cursor: None,
            deltas_sent: 0,
            started_at: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Next framed record, or `None` once the terminal event has been
    /// handed out
    pub async fn next_record(&mut self) -> Option<Bytes> {
        loop {
            if let Some(record) = self.outbox.pop_front() {
                return Some(record);
            }
            if self.state.is_terminal() {
                return None;
            }
            let input = self.next_input().await;
            self.apply(input);
        }
    }

    /// Pull-based stream of records for the transport
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            let record = session.next_record().await?;
            Some((record, session))
        })
    }

    /// Decide what happens next. This is where the session waits: on the
    /// backend, or on the pacing delay between deltas.
    async fn next_input(&mut self) -> RunInput {
        match self.state {
            RunState::Init => match self.rejection.take() {
                Some(error) => RunInput::fail(error),
                None => RunInput::Start {
                    ids: RunIds {
                        thread_id: self
                            .ids
                            .resolve(self.context.supplied_thread_id.as_deref(), IdKind::Thread),
                        run_id: self
                            .ids
                            .resolve(self.context.supplied_run_id.as_deref(), IdKind::Run),
                    },
                },
            },
            RunState::Started { .. } => RunInput::OpenMessage {
                message_id: self.ids.allocate(IdKind::Message),
            },
            RunState::Streaming { .. } => {
                if let Some(request) = self.generation.take() {
                    return self.generate(request).await;
                }
                self.next_delta().await
            }
            RunState::SnapshotReady { .. } => RunInput::Finish,
            RunState::Finished { .. } | RunState::Errored { .. } => {
                RunInput::fail(RunFailure::Protocol("run already ended".to_string()))
            }
        }
    }

    async fn generate(&self, request: GenerationRequest) -> RunInput {
        let deadline = self.settings.generation_timeout;
        let call = tokio::time::timeout(deadline, self.adapter.generate(&request));

        tokio::select! {
            () = self.shutdown.cancelled() => RunInput::fail(RunFailure::Cancelled),
            result = call => match result {
                Ok(Ok(text)) => RunInput::Generated { text },
                Ok(Err(e)) => RunInput::fail(e),
                Err(_) => RunInput::fail(GenerationError::timeout(deadline)),
            },
        }
    }

    async fn next_delta(&mut self) -> RunInput {
        let Some(cursor) = self.cursor.as_mut() else {
            return RunInput::fail(RunFailure::Protocol(
                "streaming without generated text".to_string(),
            ));
        };
        if cursor.is_exhausted() {
            return RunInput::Complete;
        }

        let delay = self.settings.chunk_delay;
        if self.deltas_sent > 0 && !delay.is_zero() {
            tokio::select! {
                () = self.shutdown.cancelled() => return RunInput::fail(RunFailure::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }

        match self.cursor.as_mut().and_then(DeltaCursor::next_delta) {
            Some(delta) => {
                self.deltas_sent += 1;
                RunInput::Delta { delta }
            }
            None => RunInput::Complete,
        }
    }

    /// Feed one input through the state machine and execute its effects.
    /// The new state is committed only once every event of the transition
    /// has been framed; a framing fault instead fails the run from the old
    /// state.
    fn apply(&mut self, input: RunInput) {
        let failing = matches!(input, RunInput::Fail { .. });

        let result = match transition(&self.state, &self.context, input) {
            Ok(result) => result,
            Err(TransitionError::RunClosed) => {
                tracing::debug!(state = self.state.name(), "Input after run ended ignored");
                return;
            }
            Err(e) => {
                tracing::error!(
                    run_id = self.run_id(),
                    state = self.state.name(),
                    error = %e,
                    "Protocol violation, failing run"
                );
                self.apply(RunInput::fail(RunFailure::Protocol(e.to_string())));
                return;
            }
        };

        for effect in result.effects {
            if let Err(e) = self.execute(effect) {
                if failing {
                    tracing::error!(run_id = self.run_id(), error = %e, "Dropping unframeable RUN_ERROR");
                    break;
                }
                tracing::error!(run_id = self.run_id(), error = %e, "Event framing failed");
                self.apply(RunInput::fail(RunFailure::Serialization(e.to_string())));
                return;
            }
        }

        self.state = result.new_state;
        self.log_outcome();
    }

    fn execute(&mut self, effect: Effect) -> Result<(), FrameError> {
        match effect {
            Effect::Emit(event) => {
                let stamped = self.stamper.stamp(event);
                let record = self.framer.encode(&stamped)?;
                tracing::debug!(
                    run_id = self.run_id(),
                    event = stamped.event.kind().as_str(),
                    message_id = stamped.event.message_id(),
                    "Event emitted"
                );
                self.outbox.push_back(record);
            }
            Effect::RequestGeneration(request) => {
                self.generation = Some(request);
            }
            Effect::StreamText { text } => {
                self.cursor = Some(DeltaCursor::new(text, self.settings.chunk_policy));
            }
        }
        Ok(())
    }

    fn log_outcome(&self) {
        let elapsed_ms = self.started_at.elapsed().as_millis();
        match &self.state {
            RunState::Started { ids } => tracing::info!(
                thread_id = %ids.thread_id,
                run_id = %ids.run_id,
                messages = self.context.messages.len(),
                backend = self.adapter.backend(),
                "Run started"
            ),
            RunState::Finished { ids } => tracing::info!(
                thread_id = %ids.thread_id,
                run_id = %ids.run_id,
                deltas = self.deltas_sent,
                elapsed_ms,
                "Run finished"
            ),
            RunState::Errored {
                thread_id,
                run_id,
                message,
            } => tracing::warn!(
                thread_id = thread_id.as_deref(),
                run_id = run_id.as_deref(),
                error = %message,
                elapsed_ms,
                "Run failed"
            ),
            _ => {}
        }
    }

    fn run_id(&self) -> Option<&str> {
        self.state
            .ids()
            .map(|ids| ids.run_id.as_str())
            .or(self.context.supplied_run_id.as_deref())
    }
}

impl Drop for RunSession {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            tracing::info!(
                run_id = self.run_id(),
                state = self.state.name(),
                "Client disconnected, run abandoned"
            );
        }
    }
}
