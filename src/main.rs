//! textopt CLI - iterative text optimization with a local Ollama model
//!
//! Two modes:
//!
//! 1. `serve` (default): check Ollama, then host the browser form on
//!    127.0.0.1:7860
//! 2. `run`: one headless optimization, printed to stdout
//!
//! Refuses to start the server when Ollama is unreachable: the form would
//! be useless and the failure is clearer at startup.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use textopt::config::Config;
use textopt::engine::{LlmBackend, OllamaBackend, available_models, preferred_model};
use textopt::flow::{EntryStatus, OptimizationOutcome, OptimizationRequest, run_optimization_flow};
use textopt::web::{AppState, serve};

/// Iterative text optimization with a local Ollama model
///
/// Write a question and describe how the answer should be improved. The model
/// answers, critiques its own answer against your criteria, and rewrites it.
///
/// Examples:
///   textopt                                   # Serve the form on 127.0.0.1:7860
///   textopt serve --port 8080                 # Custom port
///   textopt run -q "Explain TCP slow start."  # Headless single run
#[derive(Parser, Debug)]
#[command(name = "textopt")]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./textopt.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Ollama base URL, overrides the config file
    #[arg(long, global = true)]
    pub ollama_url: Option<String>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the browser form
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one optimization and print the result
    Run {
        /// Question or instruction to answer
        #[arg(short, long)]
        question: String,

        /// Improvement criteria (defaults to the configured criteria)
        #[arg(long)]
        criteria: Option<String>,

        /// Optimization cycles
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Ollama model (defaults to the configured model, if installed)
        #[arg(short, long)]
        model: Option<String>,

        /// Constraint the rewritten answer must follow (repeatable)
        #[arg(long = "constraint")]
        constraints: Vec<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let mut config = Config::load(cli.config.as_deref(), &cwd)?;
    if let Some(url) = &cli.ollama_url {
        config.ollama.base_url = url.clone();
    }
    if cli.verbose {
        eprintln!("{}", config.display_summary());
    }

    match cli.command {
        None => run_server(config, None, None),
        Some(Command::Serve { host, port }) => run_server(config, host, port),
        Some(Command::Run { question, criteria, iterations, model, constraints, json }) => {
            let backend = OllamaBackend::new(&config.ollama);
            let model = match model {
                Some(m) => m,
                None => {
                    let models = available_models(&backend, &config.ollama);
                    preferred_model(&models, &config.ollama)
                        .unwrap_or_else(|| config.ollama.default_model.clone())
                }
            };
            let request = OptimizationRequest {
                question,
                criteria: criteria.unwrap_or_else(|| config.optimization.default_criteria.clone()),
                iterations: iterations.unwrap_or(config.optimization.default_iterations),
                model,
                constraints,
            };
            let outcome = run_optimization_flow(&backend, &request, &config.optimization);
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            if !outcome.is_complete() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "textopt=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run_server(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let backend = OllamaBackend::new(&config.ollama);
    let status = backend.check_connection();
    if !status.connected {
        eprintln!(
            "{} Ollama was not detected at {}. Check that it is running.",
            "ERROR:".red().bold(),
            status.base_url
        );
        bail!("model server unreachable");
    }

    println!("{} Ollama detected", "✓".green());
    println!("📦 Available models: {}", status.models.join(", "));
    println!(
        "🚀 Starting textopt on {}",
        format!("http://{}", config.server.address()).bold()
    );

    let state = AppState::new(Arc::new(backend), config);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(state))
}

fn print_outcome(outcome: &OptimizationOutcome) {
    for entry in &outcome.history {
        let label = format!("[{}]", entry.iteration);
        match entry.status {
            EntryStatus::Initial | EntryStatus::Success => {
                println!("{} {}", label.cyan().bold(), entry.feedback.as_deref().unwrap_or(""));
            }
            _ => {
                println!("{} {}", label.red().bold(), entry.error.as_deref().unwrap_or(""));
            }
        }
    }
    println!();
    println!("{}", " FINAL ANSWER ".bold().on_magenta());
    println!("{}", outcome.final_answer);
    println!();
    println!("{}", outcome.final_status.dimmed());
}
