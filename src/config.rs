//! Configuration loading from textopt.toml.
//!
//! Search order:
//! 1. An explicit path (`--config`), which must exist
//! 2. `textopt.toml` in the working directory
//! 3. Built-in defaults
//!
//! ## Example
//!
//! ```toml
//! [ollama]
//! base_url = "http://localhost:11434"
//! default_model = "qwen3:4b"
//! fallback_models = ["qwen3:4b", "qwen3", "llama3.1"]
//!
//! [server]
//! host = "127.0.0.1"
//! port = 7860
//!
//! [optimization]
//! default_iterations = 2
//! max_iterations = 5
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "textopt.toml";

/// Criteria pre-filled in the form and restored by "Clear".
pub const DEFAULT_CRITERIA: &str = "Be very critical. Evaluate the clarity, accuracy and simplicity \
of the answer. Point out factual errors and suggest ways to make the explanation easier to understand.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config in {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub default_model: String,
    /// Offered when the server is unreachable or reports no models.
    pub fallback_models: Vec<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "qwen3:4b".to_string(),
            fallback_models: vec![
                "qwen3:4b".to_string(),
                "qwen3".to_string(),
                "llama3.1".to_string(),
            ],
            connect_timeout_secs: 5,
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 7860 }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub default_iterations: usize,
    pub max_iterations: usize,
    pub min_question_chars: usize,
    pub default_criteria: String,
    /// Past feedback rounds shown to the optimizer (0 = only the current round).
    pub gradient_memory: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            default_iterations: 2,
            max_iterations: 5,
            min_question_chars: 10,
            default_criteria: DEFAULT_CRITERIA.to_string(),
            gradient_memory: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source file for this config (for display).
    #[serde(skip)]
    pub source: Option<PathBuf>,
    pub ollama: OllamaConfig,
    pub server: ServerConfig,
    pub optimization: OptimizationConfig,
}

impl Config {
    /// Load from an explicit path, or from `textopt.toml` in `directory`, or defaults.
    pub fn load(explicit: Option<&Path>, directory: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        let local = directory.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::from_file(&local);
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.source = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            path: self.source.clone().unwrap_or_default(),
            message: message.to_string(),
        };
        let opt = &self.optimization;
        if opt.max_iterations == 0 {
            return Err(invalid("optimization.max_iterations must be at least 1"));
        }
        if opt.default_iterations == 0 || opt.default_iterations > opt.max_iterations {
            return Err(invalid("optimization.default_iterations must be within 1..=max_iterations"));
        }
        if self.ollama.fallback_models.is_empty() {
            return Err(invalid("ollama.fallback_models must not be empty"));
        }
        Ok(())
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();
        match self.source {
            Some(ref source) => lines.push(format!("   Config: {}", source.display())),
            None => lines.push("   Config: (defaults)".to_string()),
        }
        lines.push(format!("   Ollama: {}", self.ollama.base_url));
        lines.push(format!("   Default model: {}", self.ollama.default_model));
        lines.push(format!(
            "   Iterations: {} (max {})",
            self.optimization.default_iterations, self.optimization.max_iterations
        ));
        lines.join("\n")
    }
}
