//! Ollama HTTP backend.
//!
//! Uses two endpoints of the Ollama REST API:
//!
//! - `GET  /api/tags` lists installed models (doubles as the liveness probe)
//! - `POST /api/chat` with `"stream": false` for a single completion
//!
//! Calls are blocking; async callers run them on a blocking thread.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ChatMessage, EngineError, LlmBackend};
use crate::config::OllamaConfig;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct OllamaBackend {
    base_url: String,
    probe: ureq::Agent,
    agent: ureq::Agent,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Self {
        let probe = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.connect_timeout_secs))
            .build();
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            probe,
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_error(&self, url: &str, err: ureq::Error) -> EngineError {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                EngineError::Status { status, message: error_message(&body) }
            }
            ureq::Error::Transport(t) => EngineError::Transport {
                url: url.to_string(),
                message: t.to_string(),
            },
        }
    }
}

impl LlmBackend for OllamaBackend {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn list_models(&self) -> Result<Vec<String>, EngineError> {
        let url = self.url("/api/tags");
        let response = self.probe.get(&url).call().map_err(|e| self.map_error(&url, e))?;
        let body = response
            .into_string()
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        parse_tags(&body)
    }

    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, EngineError> {
        let url = self.url("/api/chat");
        let request = ChatRequest { model, messages, stream: false };

        tracing::debug!(model, messages = messages.len(), "ollama chat request");
        let response = self
            .agent
            .post(&url)
            .send_json(&request)
            .map_err(|e| self.map_error(&url, e))?;
        let body = response
            .into_string()
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        parse_chat(&body)
    }
}

/// Sorted, de-duplicated model names from an `/api/tags` body.
fn parse_tags(body: &str) -> Result<Vec<String>, EngineError> {
    let tags: TagsResponse =
        serde_json::from_str(body).map_err(|e| EngineError::Decode(e.to_string()))?;
    let mut names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
    names.sort();
    names.dedup();
    Ok(names)
}

/// Assistant content from a non-streaming `/api/chat` body.
fn parse_chat(body: &str) -> Result<String, EngineError> {
    let chat: ChatResponse =
        serde_json::from_str(body).map_err(|e| EngineError::Decode(e.to_string()))?;
    if let Some(error) = chat.error {
        return Err(EngineError::Status { status: 200, message: error });
    }
    chat.message
        .map(|m| m.content)
        .ok_or_else(|| EngineError::Decode("response has no message".to_string()))
}

/// Ollama reports failures as `{"error": "..."}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().chars().take(300).collect())
}
