//! Anthropic adapter: summarization and chat over the Messages API.
//!
//! Anthropic provides no embeddings endpoint, so `embed_batch` fails with a
//! capability-missing error and the registry's callers route embedding work
//! elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AdapterCapabilities, ChatReply, Message, ModelAdapter, Role, Summary, status_error};
use crate::error::{Result, TensorError};

/// Default base URL for the Anthropic API
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Messages API version header required on every request.
const API_VERSION: &str = "2023-06-01";

/// Model used for summarize and chat.
const CHAT_MODEL: &str = "claude-3-haiku-20240307";

/// Ceiling applied when the caller does not bound the reply.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter over the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicAdapter {
    api_key: String,
    http: Client,
    base_url: String,
}

impl AnthropicAdapter {
    /// Create a new adapter with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create an adapter with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into(),
        }
    }

    /// Call the Messages API and return the first text block of the reply.
    ///
    /// The API takes system instructions as a separate field and only
    /// user/assistant turns in `messages`, so system messages are lifted out
    /// of the conversation here.
    async fn create_message(
        &self,
        messages: &[Message],
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);

        let mut system_parts: Vec<&str> = Vec::new();
        if let Some(system) = system {
            system_parts.push(system);
        }
        let mut turns: Vec<&Message> = Vec::new();
        for message in messages {
            match message.role {
                Role::System => system_parts.push(&message.content),
                Role::User | Role::Assistant => turns.push(message),
            }
        }

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest {
                model: CHAT_MODEL,
                max_tokens,
                system: if system_parts.is_empty() {
                    None
                } else {
                    Some(system_parts.join("\n"))
                },
                messages: &turns,
            })
            .send()
            .await
            .map_err(|e| TensorError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("anthropic", status));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| TensorError::Http(e.to_string()))?;

        body.content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| TensorError::Api {
                status: status.as_u16(),
                message: "message reply had no text content".to_string(),
            })
    }
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic/claude-3-haiku"
    }

    fn version(&self) -> &str {
        "anthropic-v1"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            embed: false,
            summarize: true,
            chat: true,
        }
    }

    async fn embed_batch(&self, _inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        Err(TensorError::NotImplemented(
            "anthropic embeddings not available".to_string(),
        ))
    }

    async fn summarize(&self, text: &str, _strict: bool, max_tokens: u32) -> Result<Summary> {
        let system_prompt = format!(
            "You are a strict summarizer. Produce a single-sentence factual summary \
             (max {max_tokens} words) that is directly supported by the text. \
             If insufficient context, respond: 'INSUFFICIENT CONTEXT'."
        );

        let messages = [Message::user(text)];
        let content = self
            .create_message(&messages, Some(&system_prompt), max_tokens)
            .await?;

        let summary = content.trim().to_string();
        let confidence = if summary.contains("INSUFFICIENT CONTEXT") {
            0.0
        } else {
            0.85
        };

        Ok(Summary {
            summary,
            confidence,
        })
    }

    async fn chat(&self, messages: &[Message], max_tokens: Option<u32>) -> Result<ChatReply> {
        let reply = self
            .create_message(messages, None, max_tokens.unwrap_or(DEFAULT_MAX_TOKENS))
            .await?;
        Ok(ChatReply { reply })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: &'a [&'a Message],
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}
