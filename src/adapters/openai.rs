//! OpenAI adapter: embeddings, summarization, and chat over the REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AdapterCapabilities, ChatReply, Message, ModelAdapter, Summary, status_error};
use crate::error::{Result, TensorError};

/// Default base URL for the OpenAI API
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Embedding model requested from the API.
const EMBED_MODEL: &str = "text-embedding-3-small";

/// Completion model used for summarize and chat.
const CHAT_MODEL: &str = "gpt-4o-mini";

/// Adapter over the OpenAI embeddings and chat-completions endpoints.
///
/// All calls are plain async HTTP; nothing here blocks the dispatcher.
#[derive(Clone)]
pub struct OpenAiAdapter {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenAiAdapter {
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

    /// Run a chat completion and return the first choice's content.
    async fn chat_completion(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model: CHAT_MODEL,
                messages,
                max_tokens,
                temperature,
            })
            .send()
            .await
            .map_err(|e| TensorError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("openai", status));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TensorError::Http(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TensorError::Api {
                status: status.as_u16(),
                message: "completion returned no choices".to_string(),
            })
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai/text-embedding-3-small"
    }

    fn version(&self) -> &str {
        "openai-v1"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            embed: true,
            summarize: true,
            chat: true,
        }
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: EMBED_MODEL,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| TensorError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("openai", status));
        }

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| TensorError::Http(e.to_string()))?;

        // The API aligns results with inputs via `index`, not array order.
        let mut data = body.data;
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    async fn summarize(&self, text: &str, _strict: bool, max_tokens: u32) -> Result<Summary> {
        let system_prompt = format!(
            "You are a strict summarizer. Produce a single-sentence factual summary \
             (max {max_tokens} words) that is directly supported by the text and \
             contains no new information. If the text does not contain enough \
             information, respond: 'INSUFFICIENT CONTEXT'."
        );

        let messages = [Message::system(system_prompt), Message::user(text)];
        let content = self
            .chat_completion(&messages, Some(max_tokens), 0.0)
            .await?;

        let summary = content.trim().to_string();
        let confidence = if summary.contains("INSUFFICIENT CONTEXT") {
            0.0
        } else {
            0.9
        };

        Ok(Summary {
            summary,
            confidence,
        })
    }

    async fn chat(&self, messages: &[Message], max_tokens: Option<u32>) -> Result<ChatReply> {
        let reply = self.chat_completion(messages, max_tokens, 0.1).await?;
        Ok(ChatReply { reply })
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
