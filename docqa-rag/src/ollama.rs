//! Ollama embedding and chat adapters.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{DocQaError, Result};
use crate::generator::{AnswerGenerator, GenerationRequest};

/// Base URL used when `OLLAMA_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// The default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// The default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "mistral:7b";

const PROVIDER: &str = "Ollama";

/// The Ollama base URL from `OLLAMA_BASE_URL`, or [`DEFAULT_BASE_URL`].
pub fn base_url_from_env() -> String {
    std::env::var("OLLAMA_BASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

async fn error_detail(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body)
}

/// An [`EmbeddingProvider`] backed by a local Ollama server's `/api/embed`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::from_env().with_model("mxbai-embed-large");
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider talking to `base_url` with the default model.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: DEFAULT_EMBED_MODEL.into(),
        }
    }

    /// Create a provider using `OLLAMA_BASE_URL`.
    pub fn from_env() -> Self {
        Self::new(base_url_from_env())
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| DocQaError::Embedding {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbedRequest { model: &self.model, input: texts.to_vec() };
        let response = self
            .client
            .post(endpoint(&self.base_url, "api/embed"))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                DocQaError::Embedding {
                    provider: PROVIDER.into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %status, "API error");
            return Err(DocQaError::Embedding {
                provider: PROVIDER.into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            DocQaError::Embedding {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        Ok(parsed.embeddings)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// An [`AnswerGenerator`] backed by Ollama's non-streaming `/api/chat`.
pub struct OllamaChatGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChatGenerator {
    /// Create a generator talking to `base_url` with the default model.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        }
    }

    /// Create a generator using `OLLAMA_BASE_URL`.
    pub fn from_env() -> Self {
        Self::new(base_url_from_env())
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnswerGenerator for OllamaChatGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let user = request.user_message();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &user },
            ],
            stream: false,
        };

        debug!(provider = PROVIDER, model = %self.model, context_len = request.context.len(), "generating answer");

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DocQaError::Generation {
                provider: PROVIDER.into(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            return Err(DocQaError::Generation {
                provider: PROVIDER.into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| DocQaError::Generation {
            provider: PROVIDER.into(),
            message: format!("failed to parse response: {e}"),
        })?;

        Ok(parsed.message.content.trim().to_string())
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
