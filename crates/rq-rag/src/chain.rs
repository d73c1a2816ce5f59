//! Retrieval-QA chain
//!
//! Retrieves up to `k` documents for a query, stuffs them into the QA prompt
//! and asks the LLM once. The documents it used are returned with the answer.
//!
//! Author: hephaex@gmail.com

use crate::prompt::{format_documents, stuff_qa_prompt};
use rq_core::{Document, LlmClient, PromptTemplate, Result, Retriever};
use std::collections::HashMap;
use std::sync::Arc;

/// Answer text plus the documents it was generated from
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    pub text: String,
    pub source_documents: Vec<Document>,
}

pub struct RetrievalQaChain {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmClient>,
    k: usize,
    qa_prompt: PromptTemplate,
}

impl RetrievalQaChain {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LlmClient>, k: usize) -> Result<Self> {
        Ok(Self {
            retriever,
            llm,
            k,
            qa_prompt: stuff_qa_prompt()?,
        })
    }

    /// Retrieve with `query` as search text, then answer it
    pub async fn call(&self, query: &str) -> Result<ChainOutput> {
        let documents = self.retriever.retrieve(query, self.k).await?;
        tracing::debug!(
            "{} retriever returned {} documents",
            self.retriever.name(),
            documents.len()
        );
        self.combine_documents(query, documents).await
    }

    /// Answer `question` from an already retrieved document set
    pub async fn combine_documents(
        &self,
        question: &str,
        mut documents: Vec<Document>,
    ) -> Result<ChainOutput> {
        documents.truncate(self.k);

        let context = format_documents(&documents);
        let prompt = self.qa_prompt.format(&HashMap::from([
            ("context", context.as_str()),
            ("question", question),
        ]))?;

        tracing::info!("Calling LLM with prompt length: {} chars", prompt.len());
        let text = self.llm.generate(&prompt).await?;
        tracing::info!("LLM response received: {} chars", text.len());

        Ok(ChainOutput {
            text,
            source_documents: documents,
        })
    }
}
