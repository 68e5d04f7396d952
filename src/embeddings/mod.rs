//! Embedding stage: chunks at ingest, a single query at retrieval
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lumina::config::AppConfig;
//! use lumina::embeddings::EmbeddingStage;
//! use lumina::llm::ResilientModelClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let client = Arc::new(ResilientModelClient::from_config(&config)?);
//!     let stage = EmbeddingStage::from_config(client, &config);
//!
//!     let embedding = stage.embed_query("what color is the sky?").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::AppConfig;
use crate::errors::LuminaError;
use crate::errors::Result;
use crate::llm::ResilientModelClient;
use crate::models::Chunk;
use crate::models::EmbeddingVector;

/// Default embedding dimension for `gemini-embedding-001` truncated output
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Texts per `embed_batch` call
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause every this many chunks during ingest
pub const DEFAULT_PROGRESS_EVERY: usize = 5;

pub const DEFAULT_PROGRESS_PAUSE: Duration = Duration::from_millis(500);

/// Turns chunks and queries into vectors of the configured dimension
pub struct EmbeddingStage {
    client: Arc<ResilientModelClient>,
    dimension: usize,
    batch_size: usize,
    progress_every: usize,
    progress_pause: Duration,
}

impl EmbeddingStage {
    pub fn new(client: Arc<ResilientModelClient>, dimension: usize) -> Self {
        Self {
            client,
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_every: DEFAULT_PROGRESS_EVERY,
            progress_pause: DEFAULT_PROGRESS_PAUSE,
        }
    }

    pub fn from_config(client: Arc<ResilientModelClient>, config: &AppConfig) -> Self {
        Self::new(client, config.embedding_dimension())
            .with_batch_size(config.embeddings.batch_size)
            .with_progress_pause(
                config.embeddings.progress_every,
                Duration::from_millis(config.embeddings.progress_pause_ms),
            )
    }

    /// Texts handed to each `embed_batch` call; the client pauses between batches
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Pause for `pause` before every `every`-th chunk during ingest
    #[must_use]
    pub fn with_progress_pause(mut self, every: usize, pause: Duration) -> Self {
        self.progress_every = every;
        self.progress_pause = pause;
        self
    }

    /// Get the embedding dimension
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed chunks in index order
    ///
    /// Chunks go to the client in progress windows of `progress_every`; each
    /// window is embedded with `embed_batch` and checked before the next one
    /// starts, with a progress pause in between.
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<EmbeddingVector>> {
        let total = chunks.len();
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let window = if self.progress_every == 0 {
            total.max(1)
        } else {
            self.progress_every
        };
        let mut embeddings = Vec::with_capacity(total);

        for (i, group) in texts.chunks(window).enumerate() {
            if i > 0 {
                info!("Processed {}/{} chunks, pausing briefly...", embeddings.len(), total);
                tokio::time::sleep(self.progress_pause).await;
            }

            let batch = self.client.embed_batch(group, self.batch_size).await?;
            for embedding in &batch {
                self.check_dimension(embedding)?;
            }
            embeddings.extend(batch);
        }

        Ok(embeddings)
    }

    /// Embed a query, no batching
    pub async fn embed_query(&self, query: &str) -> Result<EmbeddingVector> {
        let embedding = self.client.embed(query).await?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.dimension {
            Ok(())
        } else {
            Err(LuminaError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            })
        }
    }
}
