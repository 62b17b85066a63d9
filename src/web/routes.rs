use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::config::Config;
use crate::engine::{ConnectionStatus, LlmBackend, available_models, preferred_model};
use crate::flow::{OptimizationRequest, run_optimization_flow};

const INDEX_HTML: &str = include_str!("index.html");
const WAITING_STATUS: &str = "Waiting for optimization...";

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn LlmBackend>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(backend: Arc<dyn LlmBackend>, config: Config) -> Self {
        Self { backend, config: Arc::new(config) }
    }
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<String>,
    selected: Option<String>,
}

#[derive(Debug, Serialize)]
struct DefaultsResponse {
    question: &'static str,
    criteria: String,
    iterations: usize,
    max_iterations: usize,
    answer: &'static str,
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/models", get(models))
        .route("/api/defaults", get(defaults))
        .route("/api/optimize", post(optimize))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let address = state.config.server.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", address, e))?;
    tracing::info!(%address, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<AppState>) -> Response {
    let backend = state.backend.clone();
    blocking(move || backend.check_connection())
        .await
        .map(|s: ConnectionStatus| Json(s).into_response())
        .unwrap_or_else(|r| r)
}

async fn models(State(state): State<AppState>) -> Response {
    blocking(move || {
        let models = available_models(state.backend.as_ref(), &state.config.ollama);
        let selected = preferred_model(&models, &state.config.ollama);
        ModelsResponse { models, selected }
    })
    .await
    .map(|m| Json(m).into_response())
    .unwrap_or_else(|r| r)
}

async fn defaults(State(state): State<AppState>) -> Json<DefaultsResponse> {
    let opt = &state.config.optimization;
    Json(DefaultsResponse {
        question: "",
        criteria: opt.default_criteria.clone(),
        iterations: opt.default_iterations,
        max_iterations: opt.max_iterations,
        answer: "",
        status: WAITING_STATUS,
    })
}

async fn optimize(State(state): State<AppState>, Json(request): Json<OptimizationRequest>) -> Response {
    blocking(move || run_optimization_flow(state.backend.as_ref(), &request, &state.config.optimization))
        .await
        .map(|outcome| Json(outcome).into_response())
        .unwrap_or_else(|r| r)
}

/// Run `f` on the blocking pool; a panicked task becomes a 500.
async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "request task failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("internal error: {}", e) })),
        )
            .into_response()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedBackend;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(backend: ScriptedBackend) -> Router {
        router(AppState::new(Arc::new(backend), Config::default()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index_serves_form() {
        let response = app(ScriptedBackend::new())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("id=\"optimize\""));
    }

    #[tokio::test]
    async fn test_status_offline() {
        let response = app(ScriptedBackend::offline())
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["connected"], false);
    }

    #[tokio::test]
    async fn test_models_preselects_default() {
        let backend = ScriptedBackend::new().with_models(["llama3.1", "qwen3:4b"]);
        let response = app(backend)
            .oneshot(Request::get("/api/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["models"].as_array().unwrap().len(), 2);
        assert_eq!(json["selected"], "qwen3:4b");
    }

    #[tokio::test]
    async fn test_defaults() {
        let response = app(ScriptedBackend::new())
            .oneshot(Request::get("/api/defaults").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["iterations"], 2);
        assert_eq!(json["max_iterations"], 5);
        assert_eq!(json["status"], WAITING_STATUS);
    }

    #[tokio::test]
    async fn test_optimize_round_trip() {
        let backend = ScriptedBackend::new().with_replies([
            "first draft",
            "too long",
            "cut the intro",
            "<IMPROVED_VARIABLE>short draft</IMPROVED_VARIABLE>",
        ]);
        let payload = json!({
            "question": "Explain photosynthesis simply.",
            "criteria": "Be concise.",
            "iterations": 1,
            "model": "qwen3:4b"
        });
        let response = app(backend)
            .oneshot(
                Request::post("/api/optimize")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["final_answer"], "short draft");
        assert_eq!(json["final_status"], "Completed after 1 iterations.");
        assert_eq!(json["history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_optimize_validation_failure_is_ok_response() {
        let payload = json!({ "question": "short", "criteria": "c", "iterations": 1, "model": "m" });
        let response = app(ScriptedBackend::new())
            .oneshot(
                Request::post("/api/optimize")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["final_status"], "Failed");
        assert_eq!(json["history"][0]["status"], "validation_failed");
    }
}
