//! HTTP surface for the gateway.
//!
//! Four routes: `POST /v1/embed` (bearer-authenticated), `POST
//! /v1/summarize`, `POST /v1/chat`, and `GET /v1/health`. Handlers are thin:
//! they pick an adapter through the registry, delegate to the batcher or the
//! adapter itself, and time the call end to end. All shared state is
//! injected by the composition root; nothing here is global.

pub mod auth;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::adapters::AdapterRegistry;
use crate::batcher::EmbedBatcher;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AdapterRegistry>,
    pub batcher: EmbedBatcher,
    pub started_at: Instant,
}

impl AppState {
    /// Bundle the gateway's components for the router.
    pub fn new(registry: Arc<AdapterRegistry>, batcher: EmbedBatcher) -> Self {
        Self {
            registry,
            batcher,
            started_at: Instant::now(),
        }
    }
}

/// Build the gateway router.
///
/// Only the embed route sits behind the bearer-token middleware; summarize,
/// chat, and health are open, matching the surface contract.
pub fn router(state: AppState, api_key: &str) -> Router {
    let protected = Router::new()
        .route("/v1/embed", post(routes::embed))
        .route_layer(middleware::from_fn_with_state(
            auth::AuthState {
                token: api_key.to_string(),
            },
            auth::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .route("/v1/summarize", post(routes::summarize))
        .route("/v1/chat", post(routes::chat))
        .route("/v1/health", get(routes::health))
        .with_state(state)
}
