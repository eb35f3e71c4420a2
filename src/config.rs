//! Configuration loading for the gateway.
//!
//! All settings come from the environment; every variable has a default so
//! an unconfigured process starts (with the cache pointed at a local Redis
//! and no cloud adapters registered). Invalid numeric or boolean values fall
//! back to their defaults with a warning rather than aborting startup.

use std::time::Duration;

use tracing::warn;

use crate::batcher::BatcherConfig;

/// Gateway settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// KV store connection URL; empty disables the cache.
    pub redis_url: String,
    /// Bearer token required on `/v1/embed`.
    pub api_key: String,
    /// Maximum work items per dispatched batch.
    pub max_batch: usize,
    /// Batch window in milliseconds.
    pub max_batch_wait_ms: u64,
    /// Prefer the local adapter when no provider is requested.
    pub prefer_local: bool,
    /// Registers the openai adapter when non-empty.
    pub openai_api_key: String,
    /// Registers the anthropic adapter when non-empty.
    pub anthropic_api_key: String,
    /// Local adapter model identifier.
    pub local_embed_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/0".to_string(),
            api_key: "dev-key-change-me".to_string(),
            max_batch: 64,
            max_batch_wait_ms: 25,
            prefer_local: true,
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
            local_embed_model: "all-MiniLM-L6-v2".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable lookup.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            api_key: get("TENSOR_API_KEY").unwrap_or(defaults.api_key),
            max_batch: parse_or("TENSOR_MAX_BATCH", get("TENSOR_MAX_BATCH"), defaults.max_batch),
            max_batch_wait_ms: parse_or(
                "TENSOR_BATCH_WAIT_MS",
                get("TENSOR_BATCH_WAIT_MS"),
                defaults.max_batch_wait_ms,
            ),
            prefer_local: get("PREFER_LOCAL")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.prefer_local),
            openai_api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: get("ANTHROPIC_API_KEY").unwrap_or_default(),
            local_embed_model: get("LOCAL_EMBED_MODEL").unwrap_or(defaults.local_embed_model),
        }
    }

    /// Batcher parameters derived from these settings.
    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            max_batch: self.max_batch,
            max_batch_wait: Duration::from_millis(self.max_batch_wait_ms),
            ..BatcherConfig::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = name, value = %raw, "unparseable value, using default");
                default
            }
        },
    }
}
