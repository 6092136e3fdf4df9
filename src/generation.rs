//! Text generation backends
//!
//! The run protocol only needs one thing from a backend: turn a prompt
//! (plus the conversation so far) into a completed reply, or fail.

mod echo;
mod error;
mod ollama;
#[cfg(test)]
pub mod testing;

pub use echo::EchoAdapter;
pub use error::{GenerationError, GenerationErrorKind};
pub use ollama::OllamaAdapter;

use crate::config::{BackendKind, ServerConfig};
use crate::protocol::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// Input to a single generation
///
/// Backends that keep conversation memory get it from `context` rather than
/// from state of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Content of the latest message
    pub prompt: String,
    /// Messages that came before it, oldest first
    pub context: Vec<Message>,
}

impl GenerationRequest {
    /// Split a conversation into its latest message and the history before
    /// it. `None` for an empty conversation.
    pub fn from_messages(messages: &[Message]) -> Option<Self> {
        let (latest, history) = messages.split_last()?;
        Some(Self {
            prompt: latest.content.clone(),
            context: history.to_vec(),
        })
    }
}

/// Common interface for generation backends
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Produce a completed reply
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Backend name, e.g. `ollama`
    fn backend(&self) -> &str;

    /// Model the backend is serving
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: GenerationAdapter + ?Sized> GenerationAdapter for Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }

    fn backend(&self) -> &str {
        (**self).backend()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for generation backends
pub struct LoggingAdapter {
    inner: Arc<dyn GenerationAdapter>,
}

impl LoggingAdapter {
    pub fn new(inner: Arc<dyn GenerationAdapter>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl GenerationAdapter for LoggingAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let start = std::time::Instant::now();
        let result = self.inner.generate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                tracing::info!(
                    backend = %self.inner.backend(),
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    context_messages = request.context.len(),
                    response_chars = text.chars().count(),
                    "Generation completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    backend = %self.inner.backend(),
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "Generation failed"
                );
            }
        }

        result
    }

    fn backend(&self) -> &str {
        self.inner.backend()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Build the configured backend, wrapped with logging
pub fn build_adapter(config: &ServerConfig) -> Result<Arc<dyn GenerationAdapter>, GenerationError> {
    let inner: Arc<dyn GenerationAdapter> = match config.backend {
        BackendKind::Ollama => Arc::new(OllamaAdapter::new(
            &config.ollama_host,
            &config.ollama_model,
            &config.system_prompt,
            config.generation_timeout,
        )?),
        BackendKind::Echo => Arc::new(EchoAdapter::new()),
    };
    Ok(Arc::new(LoggingAdapter::new(inner)))
}
