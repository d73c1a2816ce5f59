//! Application state management
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use rq_core::config::AppConfig;
use rq_core::Result;
use rq_rag::RagPipeline;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Builds the pipeline and its external clients
#[async_trait]
pub trait PipelineBuilder: Send + Sync {
    async fn build(&self, config: &AppConfig) -> Result<RagPipeline>;
}

/// Connects to Pinecone and the configured LLM provider
pub struct ConnectingBuilder;

#[async_trait]
impl PipelineBuilder for ConnectingBuilder {
    async fn build(&self, config: &AppConfig) -> Result<RagPipeline> {
        RagPipeline::connect(config).await
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Builds the pipeline on first use
    builder: Arc<dyn PipelineBuilder>,
    /// Pipeline, built lazily and reused afterwards
    pipeline: RwLock<Option<Arc<RagPipeline>>>,
    /// Serializes builds; `pipeline` is only write-locked to store the result
    build_lock: Mutex<()>,
}

impl AppState {
    /// Create new application state with config
    pub fn new(config: AppConfig) -> Self {
        Self::with_builder(config, Arc::new(ConnectingBuilder))
    }

    /// Create state with a custom pipeline builder
    pub fn with_builder(config: AppConfig, builder: Arc<dyn PipelineBuilder>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            builder,
            pipeline: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Whether the configuration passes validation
    pub fn config_is_valid(&self) -> bool {
        self.config.validate().is_ok()
    }

    /// Check if the pipeline has been built
    pub async fn has_pipeline(&self) -> bool {
        self.pipeline.read().await.is_some()
    }

    /// Get the pipeline, building it if this is the first successful call.
    /// A failed build is not cached.
    pub async fn pipeline(&self) -> Result<Arc<RagPipeline>> {
        if let Some(pipeline) = self.pipeline.read().await.clone() {
            return Ok(pipeline);
        }

        let _building = self.build_lock.lock().await;
        if let Some(pipeline) = self.pipeline.read().await.clone() {
            return Ok(pipeline);
        }

        tracing::info!("Initializing RAG pipeline");
        let pipeline = Arc::new(self.builder.build(&self.config).await?);
        *self.pipeline.write().await = Some(pipeline.clone());
        Ok(pipeline)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
