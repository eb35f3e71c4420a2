//! Request/response envelopes and handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::adapters::Message;
use crate::error::TensorError;
use crate::telemetry;
use crate::version::PKG_VERSION;

/// Error wrapper mapping [`TensorError`] onto HTTP responses.
///
/// Unauthorized is 401; every other failure — no adapter, capability
/// missing, provider errors, length mismatch, submit timeout — surfaces as
/// 500 with the error message preserved in the body.
#[derive(Debug)]
pub struct ApiError(pub TensorError);

impl From<TensorError> for ApiError {
    fn from(err: TensorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TensorError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Count the request and wrap the error for the response.
fn fail(endpoint: &'static str, err: TensorError) -> ApiError {
    metrics::counter!(telemetry::REQUESTS_TOTAL, "endpoint" => endpoint, "status" => "error")
        .increment(1);
    ApiError(err)
}

fn succeed(endpoint: &'static str) {
    metrics::counter!(telemetry::REQUESTS_TOTAL, "endpoint" => endpoint, "status" => "ok")
        .increment(1);
}

fn default_true() -> bool {
    true
}

fn default_summary_tokens() -> u32 {
    120
}

// ============================================================================
// Embed
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    /// Model hint; accepted but not used for routing.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub inputs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub model: String,
    pub model_version: String,
    pub vectors: Vec<Vec<f32>>,
    pub cached: Vec<bool>,
    pub timings_ms: u64,
}

/// Generate embeddings with automatic batching.
pub async fn embed(
    State(state): State<AppState>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let t0 = Instant::now();

    let adapter = state
        .registry
        .choose(request.provider.as_deref(), request.model.as_deref())
        .map_err(|e| fail("embed", e))?;
    let outcome = state
        .batcher
        .submit(adapter, request.inputs)
        .await
        .map_err(|e| fail("embed", e))?;

    succeed("embed");
    Ok(Json(EmbedResponse {
        model: outcome.adapter_name,
        model_version: outcome.adapter_version,
        vectors: outcome.vectors,
        cached: outcome.cached,
        timings_ms: t0.elapsed().as_millis() as u64,
    }))
}

// ============================================================================
// Summarize
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub text: String,
    #[serde(default = "default_true")]
    pub strict: bool,
    #[serde(default = "default_summary_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub model: String,
    pub model_version: String,
    pub summary: String,
    pub confidence: f32,
    pub timings_ms: u64,
}

/// Generate a strict factual summary.
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let t0 = Instant::now();

    let adapter = state
        .registry
        .choose(None, request.model.as_deref())
        .map_err(|e| fail("summarize", e))?;
    let summary = adapter
        .summarize(&request.text, request.strict, request.max_tokens)
        .await
        .map_err(|e| fail("summarize", e))?;

    succeed("summarize");
    Ok(Json(SummarizeResponse {
        model: adapter.name().to_string(),
        model_version: adapter.version().to_string(),
        summary: summary.summary,
        confidence: summary.confidence,
        timings_ms: t0.elapsed().as_millis() as u64,
    }))
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub model: String,
    pub model_version: String,
    pub reply: String,
    pub timings_ms: u64,
}

/// LLM chat completion.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let t0 = Instant::now();

    let adapter = state
        .registry
        .choose(request.provider.as_deref(), request.model.as_deref())
        .map_err(|e| fail("chat", e))?;
    let reply = adapter
        .chat(&request.messages, request.max_tokens)
        .await
        .map_err(|e| fail("chat", e))?;

    succeed("chat");
    Ok(Json(ChatResponse {
        model: adapter.name().to_string(),
        model_version: adapter.version().to_string(),
        reply: reply.reply,
        timings_ms: t0.elapsed().as_millis() as u64,
    }))
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_s: u64,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: PKG_VERSION,
        uptime_s: state.started_at.elapsed().as_secs(),
    })
}
