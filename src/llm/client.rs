//! Model client that absorbs external-service flakiness

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::build_backends;
use super::retry::with_retry;
use super::retry::RetryPolicy;
use super::EmbeddingBackend;
use super::GenerationBackend;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::EmbeddingVector;

/// Pause between embedding batches
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(500);

/// Embedding and generation behind a uniform retry policy
///
/// Callers never retry on their own; every external call made through this
/// client is already retried according to `policy`.
pub struct ResilientModelClient {
    embedder: Arc<dyn EmbeddingBackend>,
    generator: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
    batch_pause: Duration,
    cancel: CancellationToken,
}

impl ResilientModelClient {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        generator: Arc<dyn GenerationBackend>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            generator,
            policy,
            batch_pause: DEFAULT_BATCH_PAUSE,
            cancel: CancellationToken::new(),
        }
    }

    /// Build backends and retry policy from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let (embedder, generator) = build_backends(config)?;
        Ok(Self::new(embedder, generator, RetryPolicy::from_config(&config.retry))
            .with_batch_pause(Duration::from_millis(config.embeddings.batch_pause_ms)))
    }

    #[must_use]
    pub fn with_batch_pause(mut self, batch_pause: Duration) -> Self {
        self.batch_pause = batch_pause;
        self
    }

    /// Share a cancellation token with the caller; cancelling it stops any
    /// pending retry on this client
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Embed one text
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        with_retry(&self.policy, &self.cancel, || self.embedder.embed(text)).await
    }

    /// Generate text for one prompt
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        with_retry(&self.policy, &self.cancel, || self.generator.generate(prompt)).await
    }

    /// Embed many texts, preserving order
    ///
    /// Items are embedded one at a time; a fixed pause separates consecutive
    /// batches of `batch_size` items to stay under provider rate limits.
    pub async fn embed_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        batch_size: usize,
    ) -> Result<Vec<EmbeddingVector>> {
        let batch_size = batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(batch_size).enumerate() {
            if batch_idx > 0 {
                debug!(
                    "Embedded {}/{} texts, pausing {:?}",
                    embeddings.len(),
                    texts.len(),
                    self.batch_pause
                );
                tokio::time::sleep(self.batch_pause).await;
            }
            for text in batch {
                embeddings.push(self.embed(text.as_ref()).await?);
            }
        }

        Ok(embeddings)
    }
}
