//! Adapter registry and selection policy.
//!
//! Built once at startup from [`Settings`]; read-only afterwards. Cloud
//! adapters are registered only when their credentials are configured; the
//! local adapter is registered whenever its model loads.
//!
//! # Selection
//!
//! `choose` resolves `(provider, model, prefer_local)` to one adapter:
//!
//! 1. A requested provider that is registered wins.
//! 2. A requested provider that is not registered falls back to `local`,
//!    then to anything else registered.
//! 3. With no provider requested, `prefer_local` routes to `local` when
//!    present.
//! 4. Otherwise the first registered of `openai`, `anthropic`, `local`.
//! 5. An empty registry fails with `NoAdapter`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::ModelAdapter;
use crate::config::Settings;
use crate::error::{Result, TensorError};

/// Preference order applied when no provider is requested.
const PREFERRED_ORDER: [&str; 3] = ["openai", "anthropic", "local"];

/// Registry mapping provider names to adapter instances.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ModelAdapter>>,
    prefer_local: bool,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new(prefer_local: bool) -> Self {
        Self {
            adapters: HashMap::new(),
            prefer_local,
        }
    }

    /// Build the registry from settings, registering each adapter whose
    /// credentials (or model) are available.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::new(settings.prefer_local);

        if !settings.openai_api_key.is_empty() {
            registry.insert(
                "openai",
                Arc::new(super::OpenAiAdapter::new(&settings.openai_api_key)),
            );
            info!("registered openai adapter");
        }

        if !settings.anthropic_api_key.is_empty() {
            registry.insert(
                "anthropic",
                Arc::new(super::AnthropicAdapter::new(&settings.anthropic_api_key)),
            );
            info!("registered anthropic adapter");
        }

        #[cfg(feature = "local-inference")]
        match super::LocalAdapter::load(&settings.local_embed_model) {
            Ok(adapter) => {
                registry.insert("local", Arc::new(adapter));
                info!(model = %settings.local_embed_model, "registered local adapter");
            }
            Err(err) => {
                tracing::warn!(error = %err, "local adapter unavailable");
            }
        }

        registry
    }

    /// Register an adapter under a provider name.
    pub fn insert(&mut self, provider: impl Into<String>, adapter: Arc<dyn ModelAdapter>) {
        self.adapters.insert(provider.into(), adapter);
    }

    /// Look up an adapter by provider name.
    pub fn get(&self, provider: &str) -> Option<Arc<dyn ModelAdapter>> {
        self.adapters.get(provider).cloned()
    }

    /// Whether any adapters are registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Registered provider names, sorted for stable output.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Choose an adapter for a request.
    ///
    /// `model` is accepted but does not drive routing; it is kept in the
    /// signature so routing-by-model can land without touching callers.
    pub fn choose(
        &self,
        provider: Option<&str>,
        _model: Option<&str>,
    ) -> Result<Arc<dyn ModelAdapter>> {
        if let Some(requested) = provider {
            if let Some(adapter) = self.adapters.get(requested) {
                return Ok(adapter.clone());
            }
            // Unknown provider: local stands in, then anything registered.
            if let Some(local) = self.adapters.get("local") {
                return Ok(local.clone());
            }
            return self.any().ok_or(TensorError::NoAdapter);
        }

        if self.prefer_local {
            if let Some(local) = self.adapters.get("local") {
                return Ok(local.clone());
            }
        }

        for name in PREFERRED_ORDER {
            if let Some(adapter) = self.adapters.get(name) {
                return Ok(adapter.clone());
            }
        }

        self.any().ok_or(TensorError::NoAdapter)
    }

    fn any(&self) -> Option<Arc<dyn ModelAdapter>> {
        self.adapters.values().next().cloned()
    }
}
