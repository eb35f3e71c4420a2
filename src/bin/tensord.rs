//! tensord — Tensor gateway daemon.
//!
//! The composition root: builds settings → adapter registry → cache client →
//! batcher, injects them into the HTTP surface, and owns shutdown. The
//! dispatch loop is started here, exactly once, as a background task; on
//! ctrl-c the HTTP listener drains, the loop is signalled, and queued work
//! fails with a shutdown error before the process exits.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use tensor::adapters::AdapterRegistry;
use tensor::batcher::EmbedBatcher;
use tensor::cache::VectorCache;
use tensor::config::Settings;
use tensor::server::{self, AppState};

/// Tensor daemon — AI inference gateway.
#[derive(Parser)]
#[command(name = "tensord")]
#[command(version = tensor::version::PKG_VERSION)]
#[command(about = "Tensor inference gateway daemon")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "TENSOR_BIND", default_value = "0.0.0.0:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing with RUST_LOG env filter (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::from_env();

    let registry = Arc::new(AdapterRegistry::from_settings(&settings));
    if registry.is_empty() {
        warn!("no adapters registered; embed/summarize/chat requests will fail");
    }

    let cache = VectorCache::connect(&settings.redis_url).await;
    let cache_enabled = cache.is_enabled();

    let (batcher, dispatch) = EmbedBatcher::new(cache, settings.batcher_config());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = tokio::spawn(dispatch.run(shutdown_rx));

    let state = AppState::new(registry.clone(), batcher);
    let app = server::router(state, &settings.api_key);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(
        version = tensor::version::PKG_VERSION,
        addr = %args.bind,
        adapters = ?registry.provider_names(),
        cache_enabled,
        max_batch = settings.max_batch,
        batch_wait_ms = settings.max_batch_wait_ms,
        "tensord starting",
    );

    // Graceful shutdown: drain connections on ctrl-c, then drain the batcher.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received, draining connections");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    dispatcher.await?;

    info!("tensord stopped");
    Ok(())
}
