//! LLM Client implementations
//!
//! OpenAI chat completions (also Azure and compatible gateways) and Ollama
//! text generation. Requests are single-shot: one prompt in, the whole
//! completion out.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rq_core::{LlmClient, LlmConfig, LlmProvider, Result, RqError};
use rq_vector::http_client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

/// Send a completion request; any transport, status or decoding failure is a generation error
async fn complete<T: DeserializeOwned>(provider: &str, request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| RqError::Generation(format!("{provider} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RqError::Generation(format!(
            "{provider} error ({status}): {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RqError::Generation(format!("Invalid {provider} response: {e}")))
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// Chat completions client
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Build from config; fails without an OpenAI key
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let Some(api_key) = config.openai_api_key.as_deref() else {
            return Err(RqError::Config("OpenAI API key required".to_string()));
        };

        Ok(Self {
            http: http_client(config.timeout_secs)?,
            ..Self::new(
                api_key,
                config.model.as_str(),
                config.max_tokens,
                config.temperature,
            )
        }
        .with_base_url(config.openai_base_url()))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            });
        let response: ChatResponse = complete("OpenAI", request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RqError::Generation("OpenAI returned no completion".to_string()))
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama `/api/generate` client
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
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
            ..Self::new(config.ollama_url.as_str(), config.model.as_str())
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            });
        let response: GenerateResponse = complete("Ollama", request).await?;
        Ok(response.response)
    }
}

/// Create an LLM client for the configured provider
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => Arc::new(OpenAiClient::from_config(config)?),
        LlmProvider::Ollama => Arc::new(OllamaClient::from_config(config)?),
    };
    Ok(client)
}

// ============================================================================
// Tests
// ============================================================================
