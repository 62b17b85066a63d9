//! Scripted backend for tests and offline demos.
//!
//! Replies are served in FIFO order. Each reply is either text or an error
//! message, so a test can make exactly the Nth model call fail. Every call is
//! recorded for later inspection.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ChatMessage, EngineError, LlmBackend};

/// A recorded `chat` invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

pub struct ScriptedBackend {
    models: Option<Vec<String>>,
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    /// Connected backend with one installed model and no queued replies.
    pub fn new() -> Self {
        Self {
            models: Some(vec!["qwen3:4b".to_string()]),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backend whose liveness probe fails.
    pub fn offline() -> Self {
        Self { models: None, ..Self::new() }
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for reply in replies {
            self.push_reply(reply);
        }
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_replies().push_back(Ok(reply.into()));
    }

    /// Queue a failure for the next call.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_replies().push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmBackend for ScriptedBackend {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn list_models(&self) -> Result<Vec<String>, EngineError> {
        self.models.clone().ok_or_else(|| EngineError::Transport {
            url: self.describe(),
            message: "offline".to_string(),
        })
    }

    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, EngineError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall { model: model.to_string(), messages: messages.to_vec() });
        }
        match self.lock_replies().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(EngineError::Status { status: 500, message }),
            None => Err(EngineError::Transport {
                url: self.describe(),
                message: "script exhausted".to_string(),
            }),
        }
    }
}
