//! Model adapters: the uniform contract over embedding and text providers.
//!
//! Every provider — cloud API or in-process model — satisfies
//! [`ModelAdapter`]: a stable identity (`name`, `version`) that participates
//! in cache keys, plus the three operations the gateway exposes. Operations
//! an adapter cannot perform fail with `NotImplemented`, carrying a message
//! the HTTP surface preserves.
//!
//! Capabilities are reported structurally via [`AdapterCapabilities`] so
//! callers can dispatch by explicit match instead of probing with calls.

pub mod anthropic;
#[cfg(feature = "local-inference")]
pub mod local;
pub mod openai;
pub mod registry;

pub use anthropic::AnthropicAdapter;
#[cfg(feature = "local-inference")]
pub use local::LocalAdapter;
pub use openai::OpenAiAdapter;
pub use registry::AdapterRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TensorError};

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A strict factual summary and the adapter's confidence in it.
///
/// Confidence values are opaque per-adapter constants in `[0, 1]`, not
/// calibrated probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub confidence: f32,
}

/// A chat completion reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// What an adapter can do, reported structurally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterCapabilities {
    pub embed: bool,
    pub summarize: bool,
    pub chat: bool,
}

/// The uniform contract over providers.
///
/// `embed_batch` output is positionally aligned with its input and has the
/// same length; the batcher enforces the length half of that contract and
/// fails the batch on a mismatch. Vector dimensionality is
/// adapter-determined and not validated here.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Adapter identifier, e.g. `openai/text-embedding-3-small`.
    fn name(&self) -> &str;

    /// Model version; cache entries are invalidated when this changes.
    fn version(&self) -> &str;

    /// Structural capability report.
    fn capabilities(&self) -> AdapterCapabilities;

    /// Generate embeddings for a batch of texts, one vector per text.
    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let _ = inputs;
        Err(TensorError::NotImplemented(format!(
            "embeddings not available from {}",
            self.name()
        )))
    }

    /// Generate a strict factual summary.
    async fn summarize(&self, text: &str, strict: bool, max_tokens: u32) -> Result<Summary> {
        let _ = (text, strict, max_tokens);
        Err(TensorError::NotImplemented(format!(
            "summarization not available from {}",
            self.name()
        )))
    }

    /// Chat completion over an ordered message list.
    async fn chat(&self, messages: &[Message], max_tokens: Option<u32>) -> Result<ChatReply> {
        let _ = (messages, max_tokens);
        Err(TensorError::NotImplemented(format!(
            "chat not available from {}",
            self.name()
        )))
    }
}

/// Map a non-success provider response status to an error.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode) -> TensorError {
    match status.as_u16() {
        401 | 403 => TensorError::AuthenticationFailed,
        429 => TensorError::RateLimited,
        code => TensorError::Api {
            status: code,
            message: format!("{provider} API error: {status}"),
        },
    }
}
