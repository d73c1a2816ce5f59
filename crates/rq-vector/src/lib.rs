//! RQ Vector - Embedding and vector index access
//!
//! Provides embedding clients and the Pinecone index client, and combines
//! them into a [`Retriever`] that turns question text into documents.

use async_trait::async_trait;
use rq_core::{AppConfig, Document, Result, Retriever, VectorIndex};
use std::sync::Arc;

pub mod embedding;
pub mod pinecone;

pub use embedding::{
    create_embedding_client, http_client, EmbeddingClient, OllamaEmbedding, OpenAiEmbedding,
};
pub use pinecone::{IndexHandle, PineconeClient};

/// Embeds the query, then asks the index for its nearest neighbours
pub struct VectorStoreRetriever {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
}

impl VectorStoreRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Initialize Pinecone and the embedding provider from config
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let client = PineconeClient::init(&config.pinecone, config.llm.timeout_secs).await?;
        let index = client.index(&config.pinecone.index_name)?;
        tracing::info!(
            "Connected to Pinecone index {} at {}",
            index.name(),
            index.host()
        );

        let embedder = create_embedding_client(&config.llm)?;
        Ok(Self::new(embedder, Arc::new(index)))
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let vector = self.embedder.embed(query).await?;
        tracing::debug!("Query embedded into {} dimensions", vector.len());

        let mut documents = self.index.similarity_search(&vector, k).await?;
        documents.truncate(k);
        Ok(documents)
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rq_core::RqError;
    use std::sync::Mutex;

    struct FixedEmbedding(Vec<f32>);

    #[async_trait]
    impl EmbeddingClient for FixedEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RqError::Retrieval("embedding service down".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(RqError::Retrieval("embedding service down".to_string()))
        }
    }

    /// Returns more documents than asked for and records the query vectors
    #[derive(Default)]
    struct RecordingIndex {
        seen: Mutex<Vec<(Vec<f32>, usize)>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn similarity_search(&self, vector: &[f32], k: usize) -> Result<Vec<Document>> {
            self.seen.lock().unwrap().push((vector.to_vec(), k));
            Ok(vec![
                Document::new("first"),
                Document::new("second"),
                Document::new("third"),
            ])
        }
    }

    #[tokio::test]
    async fn test_retrieve_embeds_then_searches() {
        let index = Arc::new(RecordingIndex::default());
        let retriever =
            VectorStoreRetriever::new(Arc::new(FixedEmbedding(vec![0.1, 0.2])), index.clone());

        let docs = retriever.retrieve("who knows go?", 2).await.unwrap();

        assert_eq!(docs, vec![Document::new("first"), Document::new("second")]);
        assert_eq!(*index.seen.lock().unwrap(), vec![(vec![0.1, 0.2], 2)]);
        assert_eq!(retriever.name(), "pinecone");
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_search() {
        let index = Arc::new(RecordingIndex::default());
        let retriever = VectorStoreRetriever::new(Arc::new(FailingEmbedding), index.clone());

        let err = retriever.retrieve("q", 2).await.unwrap_err();

        assert!(matches!(err, RqError::Retrieval(_)));
        assert!(index.seen.lock().unwrap().is_empty());
    }
}
