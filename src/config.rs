//! Server configuration from the environment

use crate::chunker::ChunkPolicy;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI assistant for a chat application. Format replies in Markdown.";

/// Which generation backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Ollama,
    Echo,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "echo" => Ok(BackendKind::Echo),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

/// Settings for one server process
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub backend: BackendKind,
    pub ollama_host: String,
    pub ollama_model: String,
    pub system_prompt: String,
    /// Deadline for a single generation
    pub generation_timeout: Duration,
    /// Pause between successive deltas
    pub chunk_delay: Duration,
    pub chunk_policy: ChunkPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            backend: BackendKind::Ollama,
            ollama_host: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            generation_timeout: Duration::from_secs(120),
            chunk_delay: Duration::from_millis(50),
            chunk_policy: ChunkPolicy::Words,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep their
    /// defaults; unparsable ones are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            port: parsed(&lookup, "AGUI_PORT").unwrap_or(defaults.port),
            backend: parsed(&lookup, "AGUI_BACKEND").unwrap_or(defaults.backend),
            ollama_host: lookup("OLLAMA_HOST").unwrap_or(defaults.ollama_host),
            ollama_model: lookup("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            system_prompt: lookup("AGUI_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            generation_timeout: parsed(&lookup, "AGUI_GENERATION_TIMEOUT_SECS")
                .map_or(defaults.generation_timeout, Duration::from_secs),
            chunk_delay: parsed(&lookup, "AGUI_CHUNK_DELAY_MS")
                .map_or(defaults.chunk_delay, Duration::from_millis),
            chunk_policy: parsed(&lookup, "AGUI_CHUNK_POLICY").unwrap_or(defaults.chunk_policy),
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid setting");
            None
        }
    }
}
