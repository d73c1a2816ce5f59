//! RQ RAG - Retrieval-Augmented Generation pipeline
//!
//! Runs the resume question pipeline in a fixed order:
//! 1. Retrieve the `k` documents closest to the raw question
//! 2. Render the HR director prompt around the question
//! 3. Answer the rendered prompt with the retrieval-QA chain
//!
//! With [`RetrievalMode::Independent`] the chain searches the index again
//! using the rendered prompt as query text; with [`RetrievalMode::Shared`]
//! the documents from step 1 are handed to the chain directly.
//!
//! Author: hephaex@gmail.com

use rq_core::{
    AppConfig, LlmClient, PipelineInput, PipelineResult, PromptTemplate, RagConfig, Result,
    Retriever, RetrievalMode,
};
use rq_vector::VectorStoreRetriever;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub mod chain;
pub mod llm;
pub mod prompt;

pub use chain::{ChainOutput, RetrievalQaChain};
pub use llm::{create_llm_client, OllamaClient, OpenAiClient};

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of documents retrieved per search
    pub k: usize,

    /// Source of the generator's context documents
    pub retrieval_mode: RetrievalMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k: 2,
            retrieval_mode: RetrievalMode::Independent,
        }
    }
}

impl From<&RagConfig> for PipelineConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            k: config.top_k,
            retrieval_mode: config.retrieval_mode,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Resume question pipeline
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    chain: RetrievalQaChain,
    question_prompt: PromptTemplate,
    config: PipelineConfig,
}

impl RagPipeline {
    /// Create a pipeline over the given collaborators
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmClient>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let chain = RetrievalQaChain::new(retriever.clone(), llm, config.k)?;
        Ok(Self {
            retriever,
            chain,
            question_prompt: prompt::hr_director_prompt()?,
            config,
        })
    }

    /// Build Pinecone, embedding and LLM clients from config
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let retriever = VectorStoreRetriever::connect(config).await?;
        let llm = create_llm_client(&config.llm)?;
        Self::new(Arc::new(retriever), llm, PipelineConfig::from(&config.rag))
    }

    /// Render the HR director prompt; an absent question is a template error
    pub fn render_prompt(&self, question: Option<&str>) -> Result<String> {
        let mut values = HashMap::new();
        if let Some(question) = question {
            values.insert("question", question);
        }
        Ok(self.question_prompt.format(&values)?)
    }

    /// Run the pipeline once
    pub async fn run(&self, input: &PipelineInput) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let k = self.config.k;
        let question = input.prompt.as_deref();

        tracing::info!(
            "RAG query started (k={}, mode={:?})",
            k,
            self.config.retrieval_mode
        );

        // 1. Retrieve for the raw question
        let retrieved = match question {
            Some(q) => {
                let documents = self.retriever.retrieve(q, k).await?;
                tracing::debug!("Question retrieval returned {} documents", documents.len());
                Some(documents)
            }
            None => None,
        };

        // 2. Compose the prompt
        let rendered = self.render_prompt(question)?;
        tracing::debug!(prompt = %rendered, "Prompt rendered");
        let retrieved = retrieved.unwrap_or_default();

        // 3. Generate
        let output = match self.config.retrieval_mode {
            RetrievalMode::Shared => self.chain.combine_documents(&rendered, retrieved).await?,
            RetrievalMode::Independent => {
                let output = self.chain.call(&rendered).await?;
                if output.source_documents != retrieved {
                    tracing::debug!(
                        "Chain retrieval differs from question retrieval ({} vs {} documents)",
                        output.source_documents.len(),
                        retrieved.len()
                    );
                }
                output
            }
        };

        tracing::debug!(response = ?output, "Chain response");
        tracing::info!(
            "RAG query finished in {} ms with {} source documents",
            start_time.elapsed().as_millis(),
            output.source_documents.len()
        );

        Ok(PipelineResult {
            output: output.text,
            source_documents: output.source_documents,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
