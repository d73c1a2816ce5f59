//! Embedding client for generating vector representations
//!
//! Supports OpenAI and Ollama embedding APIs. Embedding happens as part of
//! retrieval, so every failure here is reported as a retrieval error.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rq_core::{LlmConfig, LlmProvider, Result, RqError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Turns text into the vectors the index was built with
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed one query string
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several strings, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// HTTP client with the configured request timeout, shared by every external service client
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RqError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Send an embedding request and decode the body, mapping every failure to a retrieval error
async fn fetch<T: DeserializeOwned>(provider: &str, request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| RqError::Retrieval(format!("{provider} embedding request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RqError::Retrieval(format!(
            "{provider} embedding error ({status}): {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RqError::Retrieval(format!("Invalid {provider} embedding response: {e}")))
}

// ============================================================================
// OpenAI
// ============================================================================

/// OpenAI `/embeddings` client; also serves Azure and other compatible endpoints
pub struct OpenAiEmbedding {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
        }
    }

    /// Build from LLM config; the OpenAI key is mandatory
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let Some(api_key) = config.openai_api_key.as_deref() else {
            return Err(RqError::Config("OpenAI API key required".to_string()));
        };

        Ok(Self {
            http: http_client(config.timeout_secs)?,
            ..Self::new(api_key, config.embedding_model.as_str())
        }
        .with_base_url(config.openai_base_url()))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RqError::Retrieval("OpenAI returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&OpenAiEmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        let response: OpenAiEmbeddingResponse = fetch("OpenAI", request).await?;

        // Items may arrive out of order
        let mut items = response.data;
        items.sort_by_key(|item| item.index);
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }
}

// ============================================================================
// Ollama
// ============================================================================

/// Local Ollama `/api/embeddings` client
pub struct OllamaEmbedding {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            ..Self::new(config.ollama_url.as_str(), config.embedding_model.as_str())
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            });
        let response: OllamaEmbeddingResponse = fetch("Ollama", request).await?;
        Ok(response.embedding)
    }

    /// One request per text; the endpoint takes a single prompt
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Pick the embedding backend matching the LLM provider
pub fn create_embedding_client(config: &LlmConfig) -> Result<Arc<dyn EmbeddingClient>> {
    let client: Arc<dyn EmbeddingClient> = match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => Arc::new(OpenAiEmbedding::from_config(config)?),
        LlmProvider::Ollama => Arc::new(OllamaEmbedding::from_config(config)?),
    };
    Ok(client)
}

// ============================================================================
// Tests
// ============================================================================
