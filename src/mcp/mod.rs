//! MCP (Model Context Protocol) server for textopt.
//!
//! Exposes the optimization flow to AI assistants over stdio:
//!
//! - `optimize_text`: generate an answer and refine it against criteria
//! - `list_models`: connectivity check and installed models
//!
//! # Usage
//!
//! ```bash
//! textopt-mcp
//! ```

mod server;

pub use server::{ListModelsResponse, OptimizeTextRequest, TextoptServer};
