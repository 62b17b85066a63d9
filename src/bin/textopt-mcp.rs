//! textopt MCP server binary.
//!
//! Runs the optimization flow as an MCP server over stdio. Configuration is
//! read from `textopt.toml` in the working directory, if present. Logs go to
//! stderr; stdout carries the protocol.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::{ServiceExt, transport::stdio};
use textopt::config::Config;
use textopt::engine::OllamaBackend;
use textopt::mcp::TextoptServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let config = Config::load(None, &cwd)?;
    let backend = Arc::new(OllamaBackend::new(&config.ollama));

    let service = TextoptServer::new(backend, config).serve(stdio()).await?;

    // Runs until the client disconnects
    service.waiting().await?;

    Ok(())
}
