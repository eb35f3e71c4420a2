//! Local adapter: in-process embeddings via fastembed.
//!
//! The embedding model is synchronous, so inference runs on the blocking
//! pool; the dispatcher's thread of control never executes model code.
//! Summarization is a naive first-sentence truncation (no model involved)
//! and chat is not supported.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{AdapterCapabilities, ModelAdapter, Summary};
use crate::error::{Result, TensorError};

/// Fixed confidence reported for truncation summaries.
const SUMMARY_CONFIDENCE: f32 = 0.5;

/// Adapter over a locally loaded fastembed text-embedding model.
pub struct LocalAdapter {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    name: String,
}

impl LocalAdapter {
    /// Load the named embedding model, downloading it on first use.
    ///
    /// Fails with a configuration error for unknown model names or when the
    /// model cannot be loaded; the registry treats that as "no local
    /// adapter" rather than a fatal startup error.
    pub fn load(model_name: &str) -> Result<Self> {
        let model = match model_name {
            "all-MiniLM-L6-v2" => fastembed::EmbeddingModel::AllMiniLML6V2,
            "all-MiniLM-L12-v2" => fastembed::EmbeddingModel::AllMiniLML12V2,
            "BGE-small-en" => fastembed::EmbeddingModel::BGESmallENV15,
            "BGE-base-en" => fastembed::EmbeddingModel::BGEBaseENV15,
            other => {
                return Err(TensorError::Configuration(format!(
                    "unknown local embedding model: {other}"
                )));
            }
        };

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("tensor")
            .join("models");

        let options = fastembed::InitOptions::new(model)
            .with_show_download_progress(false)
            .with_cache_dir(cache_dir);

        let instance = fastembed::TextEmbedding::try_new(options).map_err(|e| {
            TensorError::Configuration(format!("failed to load embedding model: {e}"))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(instance)),
            name: format!("local/{model_name}"),
        })
    }
}

#[async_trait]
impl ModelAdapter for LocalAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "local-v1"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            embed: true,
            summarize: true,
            chat: false,
        }
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        let model = self.model.clone();

        // fastembed is sync, wrap in spawn_blocking
        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| TensorError::Inference("embedding model lock poisoned".to_string()))?;
            guard
                .embed(texts, None)
                .map_err(|e| TensorError::Inference(format!("embedding failed: {e}")))
        })
        .await
        .map_err(|e| TensorError::Inference(format!("blocking task failed: {e}")))?
    }

    async fn summarize(&self, text: &str, strict: bool, max_tokens: u32) -> Result<Summary> {
        Ok(truncation_summary(text, strict, max_tokens as usize))
    }
}

/// First-sentence truncation summary, bounded by a rough word budget.
fn truncation_summary(text: &str, strict: bool, max_tokens: usize) -> Summary {
    let cleaned: String = text.trim().replace('\n', " ");
    let bounded: String = cleaned.chars().take(max_tokens * 10).collect();

    let summary: String = bounded
        .split('.')
        .next()
        .unwrap_or_default()
        .chars()
        .take(max_tokens)
        .collect::<String>()
        .trim()
        .to_string();

    if strict && summary.len() < 10 {
        return Summary {
            summary: "INSUFFICIENT CONTEXT".to_string(),
            confidence: 0.0,
        };
    }

    Summary {
        summary,
        confidence: SUMMARY_CONFIDENCE,
    }
}
