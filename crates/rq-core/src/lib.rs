//! RQ Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the resume query
//! service:
//! - Retrieved documents and the pipeline result
//! - Common error types
//! - Collaborator traits (retriever, vector index, LLM)
//! - Prompt templates
//! - Configuration management

pub mod config;
pub mod template;

pub use config::{
    AppConfig, ConfigError, LlmConfig, LlmProvider, LoggingConfig, PineconeConfig, RagConfig,
    RetrievalMode, ServerConfig,
};
pub use template::{PromptTemplate, TemplateError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for pipeline operations
#[derive(Error, Debug)]
pub enum RqError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Generation error: {0}")]
    Generation(String),
}

impl RqError {
    /// Short, stable name of the error kind for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Retrieval(_) => "retrieval",
            Self::Template(_) => "template",
            Self::Generation(_) => "generation",
        }
    }
}

impl From<ConfigError> for RqError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RqError>;

// ============================================================================
// Documents
// ============================================================================

/// Metadata attached to a retrieved document
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A unit of text returned by the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content of the chunk
    pub content: String,

    /// Everything else the index stored alongside the vector
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document without metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Add a metadata value
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Pipeline Types
// ============================================================================

/// Raw input of one pipeline invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineInput {
    /// User's question; absence surfaces as a template error
    #[serde(default)]
    pub prompt: Option<String>,
}

impl PipelineInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
        }
    }
}

/// Answer plus the documents the model was given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Generated answer, verbatim
    pub output: String,

    /// Documents used as context, in retrieval order
    pub source_documents: Vec<Document>,
}

// ============================================================================
// Traits
// ============================================================================

/// Text-in, documents-out retrieval (embedding + similarity search)
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` documents most similar to `query`
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Nearest-neighbour search over an existing index
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` documents ordered by similarity, most similar first
    async fn similarity_search(&self, vector: &[f32], k: usize) -> Result<Vec<Document>>;
}

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================
