//! Tensor - AI inference gateway with batched, cached embeddings
//!
//! This crate fronts several embedding and text-generation providers behind
//! one HTTP API. Its core is the embedding batcher: concurrent per-request
//! embedding calls are coalesced into provider-sized batches, deduplicated
//! through a content-addressed Redis-backed cache, and fanned back to the
//! originating requests with per-request ordering and error isolation.
//! Summarize and chat are thin pass-throughs with no batching.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tensor::adapters::AdapterRegistry;
//! use tensor::batcher::{BatcherConfig, EmbedBatcher};
//! use tensor::cache::VectorCache;
//! use tensor::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> tensor::Result<()> {
//!     let settings = Settings::from_env();
//!     let registry = Arc::new(AdapterRegistry::from_settings(&settings));
//!     let cache = VectorCache::connect(&settings.redis_url).await;
//!
//!     let (batcher, dispatch) = EmbedBatcher::new(cache, BatcherConfig::default());
//!     let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     tokio::spawn(dispatch.run(shutdown_rx));
//!
//!     let adapter = registry.choose(None, None)?;
//!     let outcome = batcher
//!         .submit(adapter, vec!["hello".to_string(), "world".to_string()])
//!         .await?;
//!     println!("{} vectors, cached: {:?}", outcome.vectors.len(), outcome.cached);
//!
//!     let _ = shutdown_tx.send(true);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod batcher;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod server;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use adapters::{
    AdapterCapabilities, AdapterRegistry, ChatReply, Message, ModelAdapter, Role, Summary,
};
pub use batcher::{BatcherConfig, EmbedBatcher, EmbedOutcome};
pub use cache::{VectorCache, VectorStore};
pub use config::Settings;
pub use error::{Result, TensorError};
pub use fingerprint::fingerprint;
