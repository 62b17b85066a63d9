//! MCP server implementation for textopt.
//!
//! Provides the `optimize_text` and `list_models` tools via MCP over stdio.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ErrorCode, ErrorData as McpError, *},
    tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::{LlmBackend, offered_models, preferred_model};
use crate::flow::{OptimizationRequest, run_optimization_flow};

/// textopt MCP server - exposes the generate-and-optimize flow as an MCP tool.
#[derive(Clone)]
pub struct TextoptServer {
    backend: Arc<dyn LlmBackend>,
    config: Arc<Config>,
    tool_router: ToolRouter<TextoptServer>,
}

/// Request parameters for the optimize_text tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OptimizeTextRequest {
    #[schemars(description = "Question or instruction to answer (at least 10 characters)")]
    pub question: String,

    #[schemars(description = "How the answer should be evaluated and improved. Defaults to a critical clarity/accuracy review.")]
    pub criteria: Option<String>,

    #[schemars(description = "Number of optimization cycles (default 2)")]
    pub iterations: Option<usize>,

    #[schemars(description = "Ollama model name. Defaults to the configured model.")]
    pub model: Option<String>,

    #[schemars(description = "Hard constraints the rewritten answer must follow")]
    pub constraints: Option<Vec<String>>,
}

/// Response from the list_models tool.
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct ListModelsResponse {
    pub connected: bool,
    pub base_url: String,
    pub models: Vec<String>,
    pub selected: Option<String>,
}

/// One probe, with the offered models derived from it.
fn models_report(backend: &dyn LlmBackend, config: &Config) -> ListModelsResponse {
    let status = backend.check_connection();
    let models = offered_models(&status, &config.ollama);
    let selected = preferred_model(&models, &config.ollama);
    ListModelsResponse {
        connected: status.connected,
        base_url: status.base_url,
        models,
        selected,
    }
}

fn internal_error(message: String) -> McpError {
    McpError {
        code: ErrorCode(-32603),
        message: Cow::from(message),
        data: None,
    }
}

#[tool_router]
impl TextoptServer {
    pub fn new(backend: Arc<dyn LlmBackend>, config: Config) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    /// Fill in defaults for omitted fields.
    fn to_flow_request(&self, request: OptimizeTextRequest) -> OptimizationRequest {
        let opt = &self.config.optimization;
        OptimizationRequest {
            question: request.question,
            criteria: request.criteria.unwrap_or_else(|| opt.default_criteria.clone()),
            iterations: request.iterations.unwrap_or(opt.default_iterations),
            model: request
                .model
                .unwrap_or_else(|| self.config.ollama.default_model.clone()),
            constraints: request.constraints.unwrap_or_default(),
        }
    }

    /// Generate an answer and refine it iteratively with LLM feedback.
    #[tool(
        name = "optimize_text",
        description = "Generate an answer to a question with a local Ollama model, then iteratively improve it: each cycle evaluates the answer against the criteria, turns the evaluation into feedback, and rewrites the answer. Returns the final answer, a status line and the per-iteration history."
    )]
    async fn optimize_text(
        &self,
        Parameters(request): Parameters<OptimizeTextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let request = self.to_flow_request(request);
        let backend = self.backend.clone();
        let config = self.config.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            run_optimization_flow(backend.as_ref(), &request, &config.optimization)
        })
        .await
        .map_err(|e| internal_error(format!("Optimization task failed: {}", e)))?;

        let json = serde_json::to_string_pretty(&outcome)
            .map_err(|e| internal_error(format!("JSON serialization failed: {}", e)))?;

        if outcome.is_complete() {
            Ok(CallToolResult::success(vec![Content::text(json)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(json)]))
        }
    }

    /// Report model server connectivity and installed models.
    #[tool(
        name = "list_models",
        description = "Check the Ollama connection and list the models available for optimize_text."
    )]
    async fn list_models(&self) -> Result<CallToolResult, McpError> {
        let backend = self.backend.clone();
        let config = self.config.clone();

        let response = tokio::task::spawn_blocking(move || {
            models_report(backend.as_ref(), &config)
        })
        .await
        .map_err(|e| internal_error(format!("Model listing failed: {}", e)))?;

        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| internal_error(format!("JSON serialization failed: {}", e)))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for TextoptServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "textopt".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: Some(
                "Iterative text optimization with a local Ollama model. \
                 Use optimize_text to get an answer refined against your criteria, \
                 and list_models to see which models are installed."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedBackend;

    fn server() -> TextoptServer {
        TextoptServer::new(Arc::new(ScriptedBackend::new()), Config::default())
    }

    #[test]
    fn test_server_creation() {
        let info = server().get_info();
        assert_eq!(info.server_info.name, "textopt");
    }

    /// Counts liveness probes; the first succeeds, later ones fail.
    struct FlakyBackend {
        probes: std::sync::atomic::AtomicUsize,
    }

    impl LlmBackend for FlakyBackend {
        fn describe(&self) -> String {
            "flaky".to_string()
        }

        fn list_models(&self) -> Result<Vec<String>, crate::engine::EngineError> {
            let n = self.probes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Ok(vec!["mistral".to_string()])
            } else {
                Err(crate::engine::EngineError::EmptyReply)
            }
        }

        fn chat(&self, _: &str, _: &[crate::engine::ChatMessage]) -> Result<String, crate::engine::EngineError> {
            Err(crate::engine::EngineError::EmptyReply)
        }
    }

    #[test]
    fn test_models_report_probes_once() {
        let backend = FlakyBackend { probes: std::sync::atomic::AtomicUsize::new(0) };
        let report = models_report(&backend, &Config::default());
        assert_eq!(backend.probes.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(report.connected);
        assert_eq!(report.models, vec!["mistral".to_string()]);
        assert_eq!(report.selected.as_deref(), Some("mistral"));
    }

    #[test]
    fn test_models_report_offline_uses_fallbacks() {
        let report = models_report(&ScriptedBackend::offline(), &Config::default());
        assert!(!report.connected);
        assert_eq!(report.models, Config::default().ollama.fallback_models);
        assert_eq!(report.selected.as_deref(), Some("qwen3:4b"));
    }

    #[test]
    fn test_request_defaults() {
        let s = server();
        let req = s.to_flow_request(OptimizeTextRequest {
            question: "Explain entropy to a child.".into(),
            criteria: None,
            iterations: None,
            model: None,
            constraints: None,
        });
        assert_eq!(req.iterations, 2);
        assert_eq!(req.model, "qwen3:4b");
        assert_eq!(req.criteria, crate::config::DEFAULT_CRITERIA);
        assert!(req.constraints.is_empty());
    }
}
