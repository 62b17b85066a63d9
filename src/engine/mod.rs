//! LLM backends.
//!
//! Everything that talks to a language model goes through [`LlmBackend`].
//! The production implementation is [`OllamaBackend`]; [`ScriptedBackend`]
//! replays canned replies so the optimization loop and the HTTP surface can
//! be tested without a model server.
//!
//! ```text
//! Engine { backend, model }
//!   └── generate(system?, prompt) → backend.chat(model, messages)
//! ```

mod ollama;
mod scripted;

pub use ollama::OllamaBackend;
pub use scripted::ScriptedBackend;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OllamaConfig;

/// Errors raised while talking to a model server.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not reach model server at {url}: {message}")]
    Transport { url: String, message: String },

    #[error("model server returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode model server response: {0}")]
    Decode(String),

    #[error("model returned an empty reply")]
    EmptyReply,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// Result of probing the model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub base_url: String,
    pub models: Vec<String>,
}

/// A chat-capable model server.
///
/// Implementations are shared across request threads, so they must be
/// `Send + Sync` and hold no per-run state.
pub trait LlmBackend: Send + Sync {
    /// Base URL (or a descriptive name) shown in status messages.
    fn describe(&self) -> String;

    /// Names of the installed models, sorted and de-duplicated.
    fn list_models(&self) -> Result<Vec<String>, EngineError>;

    /// Run one non-streaming chat completion and return the assistant text.
    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, EngineError>;

    /// Probe the server. Never fails; an unreachable server reports `connected: false`.
    fn check_connection(&self) -> ConnectionStatus {
        match self.list_models() {
            Ok(models) => ConnectionStatus { connected: true, base_url: self.describe(), models },
            Err(e) => {
                tracing::debug!(error = %e, "model server probe failed");
                ConnectionStatus { connected: false, base_url: self.describe(), models: Vec::new() }
            }
        }
    }
}

/// Models offered to the user: the live list, or the configured fallbacks when
/// the server is down or has nothing installed.
pub fn available_models(backend: &dyn LlmBackend, config: &OllamaConfig) -> Vec<String> {
    offered_models(&backend.check_connection(), config)
}

/// Same rule as [`available_models`], applied to a probe already made.
pub fn offered_models(status: &ConnectionStatus, config: &OllamaConfig) -> Vec<String> {
    if status.connected && !status.models.is_empty() {
        status.models.clone()
    } else {
        config.fallback_models.clone()
    }
}

/// The configured default model if it is on offer, else the first offered model.
pub fn preferred_model(models: &[String], config: &OllamaConfig) -> Option<String> {
    if models.iter().any(|m| m == &config.default_model) {
        Some(config.default_model.clone())
    } else {
        models.first().cloned()
    }
}

/// A backend bound to one model.
pub struct Engine<'a> {
    backend: &'a dyn LlmBackend,
    model: String,
}

impl<'a> Engine<'a> {
    pub fn new(backend: &'a dyn LlmBackend, model: impl Into<String>) -> Self {
        Self { backend, model: model.into() }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn generation with an optional system prompt.
    pub fn generate(&self, system: Option<&str>, prompt: &str) -> Result<String, EngineError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let reply = self.backend.chat(&self.model, &messages)?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(EngineError::EmptyReply);
        }
        Ok(reply.to_string())
    }
}
