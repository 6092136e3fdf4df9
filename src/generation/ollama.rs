//! Ollama chat backend

use super::{GenerationAdapter, GenerationError, GenerationRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream text quoted in an error message is cut to this many chars
const BODY_EXCERPT_CHARS: usize = 200;

/// Ollama `/api/chat` backend
///
/// Sends the whole conversation each call (`stream: false`) and returns the
/// completed assistant message.
pub struct OllamaAdapter {
    client: Client,
    endpoint: String,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

impl OllamaAdapter {
    pub fn new(
        host: &str,
        model: &str,
        system_prompt: &str,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", host.trim_end_matches('/')),
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            timeout,
        })
    }

    fn translate_request(&self, request: &GenerationRequest) -> OllamaRequest {
        let mut messages = Vec::with_capacity(request.context.len() + 2);

        if !self.system_prompt.is_empty() {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: self.system_prompt.clone(),
            });
        }

        messages.extend(request.context.iter().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        }
    }

    fn transport_error(&self, context: &str, e: &reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::timeout(self.timeout)
        } else if e.is_connect() {
            GenerationError::network(format!("Connection failed: {e}"))
        } else if e.is_body() || e.is_decode() {
            GenerationError::network(format!("{context}: {e}"))
        } else {
            GenerationError::unknown(format!("{context}: {e}"))
        }
    }

    fn parse_response(body: &str) -> Result<String, GenerationError> {
        let resp: OllamaResponse = serde_json::from_str(body).map_err(|e| {
            tracing::warn!(error = %e, body_len = body.len(), "Unparsable Ollama response");
            GenerationError::malformed(format!(
                "Failed to parse response: {e} - body: {}",
                excerpt(body)
            ))
        })?;
        Self::normalize_response(resp)
    }

    fn normalize_response(resp: OllamaResponse) -> Result<String, GenerationError> {
        if let Some(error) = resp.error {
            return Err(GenerationError::server_error(error));
        }
        resp.message
            .map(|m| m.content)
            .ok_or_else(|| GenerationError::malformed("Response contained no message"))
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> GenerationError {
        // Ollama reports failures as {"error": "..."}
        let message = serde_json::from_str::<OllamaResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| body.to_string());
        let message = excerpt(&message);

        match status.as_u16() {
            401 | 403 => GenerationError::auth(format!("Authentication failed: {message}")),
            429 => GenerationError::rate_limit(format!("Rate limited: {message}")),
            400 | 404 => GenerationError::invalid_request(format!("Invalid request: {message}")),
            500..=599 => GenerationError::server_error(format!("Server error: {message}")),
            _ => GenerationError::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

#[async_trait]
impl GenerationAdapter for OllamaAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let ollama_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| self.transport_error("Request failed", &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error("Failed to read response", &e))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        Self::parse_response(&body)
    }

    fn backend(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Leading part of an upstream body, safe to put in a client-facing message
fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let mut out: String = chars.by_ref().take(BODY_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}
