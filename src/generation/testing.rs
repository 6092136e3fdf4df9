//! Mock backend for testing
//!
//! Lets run tests script exactly what the backend does without any I/O.

use super::{GenerationAdapter, GenerationError, GenerationRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// How the mock behaves once its queue is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Pop queued outcomes, failing when the queue is empty
    Queue,
    /// Never answer
    Hang,
}

/// Mock backend that returns queued outcomes
pub struct MockAdapter {
    outcomes: Mutex<VecDeque<Result<String, GenerationError>>>,
    delay: Option<Duration>,
    mode: Mode,
    /// Record of all requests made
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            delay: None,
            mode: Mode::Queue,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Mock whose `generate` never completes
    pub fn hanging() -> Self {
        Self {
            mode: Mode::Hang,
            ..Self::new()
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_reply(&self, text: impl Into<String>) {
        self.outcomes.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_error(&self, error: GenerationError) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationAdapter for MockAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.mode == Mode::Hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::network("No mock reply queued")))
    }

    fn backend(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;

    #[tokio::test]
    async fn test_mock_adapter_queue() {
        let mock = MockAdapter::new();
        mock.queue_reply("Hello");

        let request = GenerationRequest::from_messages(&[Message::user("hi")]).unwrap();
        assert_eq!(mock.generate(&request).await.unwrap(), "Hello");

        // Second call should fail (nothing left)
        assert!(mock.generate(&request).await.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_hanging_mock_never_answers() {
        let mock = MockAdapter::hanging();
        let request = GenerationRequest::from_messages(&[Message::user("hi")]).unwrap();
        let result =
            tokio::time::timeout(Duration::from_millis(20), mock.generate(&request)).await;
        assert!(result.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
