//! textopt - iterative LLM-driven text optimization
//!
//! Answers a question with a local Ollama model, then improves the answer by
//! textual gradient descent: the model evaluates the answer against
//! user-written criteria, turns that evaluation into feedback, and rewrites
//! the answer from the feedback.
//!
//! # Architecture
//!
//! ```text
//! web (axum form + JSON API) ─┐
//! mcp (rmcp stdio tools) ─────┼─> flow ─> textgrad ─> engine ─> Ollama
//! cli (headless run) ─────────┘
//! ```

pub mod config;
pub mod engine;
pub mod flow;
pub mod mcp;
pub mod textgrad;
pub mod web;

pub use config::Config;
pub use engine::{Engine, EngineError, LlmBackend, OllamaBackend, ScriptedBackend};
pub use flow::{EntryStatus, HistoryEntry, OptimizationOutcome, OptimizationRequest, run_optimization_flow};
pub use textgrad::{BlackboxLlm, Loss, TextGradError, TextLoss, Tgd, Variable};
