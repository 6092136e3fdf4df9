//! Offline echo backend for local development

use super::{GenerationAdapter, GenerationError, GenerationRequest};
use async_trait::async_trait;

/// Replies by quoting the prompt back. Needs no model server.
#[derive(Debug, Default)]
pub struct EchoAdapter;

impl EchoAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerationAdapter for EchoAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let turn = request.context.len() / 2 + 1;
        Ok(format!("You said: {} (turn {turn})", request.prompt.trim()))
    }

    fn backend(&self) -> &str {
        "echo"
    }

    fn model_id(&self) -> &str {
        "echo"
    }
}
