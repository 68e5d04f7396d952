//! Complete RAG pipeline: Chunk -> Embed -> Store, and Retrieve -> Rerank -> Generate

use std::sync::Arc;

use tracing::debug;
use tracing::info;

use super::reranker::build_reranker;
use super::reranker::Reranker;
use super::retriever::Retriever;
use super::synthesizer::AnswerSynthesizer;
use crate::chunker::Chunker;
use crate::config::AppConfig;
use crate::config::ChunkingConfig;
use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingStage;
use crate::embeddings::DEFAULT_BATCH_SIZE;
use crate::embeddings::DEFAULT_EMBEDDING_DIM;
use crate::embeddings::DEFAULT_PROGRESS_EVERY;
use crate::embeddings::DEFAULT_PROGRESS_PAUSE;
use crate::errors::Result;
use crate::llm::ResilientModelClient;
use crate::models::AnswerResult;
use crate::models::NewRecord;
use crate::models::UserId;
use crate::store::PgVectorStore;
use crate::store::VectorStore;

/// Tunables for ingestion and retrieval
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding_dimension: usize,
    pub batch_size: usize,
    pub progress_every: usize,
    pub progress_pause_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding_dimension: DEFAULT_EMBEDDING_DIM,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_every: DEFAULT_PROGRESS_EVERY,
            progress_pause_ms: DEFAULT_PROGRESS_PAUSE.as_millis() as u64,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chunking: config.chunking.clone(),
            retrieval: config.retrieval.clone(),
            embedding_dimension: config.embedding_dimension(),
            batch_size: config.embeddings.batch_size,
            progress_every: config.embeddings.progress_every,
            progress_pause_ms: config.embeddings.progress_pause_ms,
        }
    }
}

/// Complete RAG service
///
/// Holds only shareable handles; one service can serve many owners and
/// concurrent calls.
pub struct RagService {
    chunker: Chunker,
    embedding_stage: Arc<EmbeddingStage>,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
}

impl RagService {
    /// Create from existing services
    ///
    /// # Errors
    /// - Invalid chunking settings (zero chunk size)
    pub fn new(
        client: Arc<ResilientModelClient>,
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let chunker = Chunker::from_config(&settings.chunking)?;
        let embedding_stage = Arc::new(
            EmbeddingStage::new(Arc::clone(&client), settings.embedding_dimension)
                .with_batch_size(settings.batch_size)
                .with_progress_pause(
                    settings.progress_every,
                    std::time::Duration::from_millis(settings.progress_pause_ms),
                ),
        );
        let retriever = Retriever::new(Arc::clone(&embedding_stage), Arc::clone(&store), reranker)
            .with_settings(&settings.retrieval);

        Ok(Self {
            chunker,
            embedding_stage,
            store,
            retriever,
            synthesizer: AnswerSynthesizer::new(client),
            top_k: settings.retrieval.top_k,
        })
    }

    /// Create a service backed by PostgreSQL and the configured model provider
    ///
    /// # Errors
    /// - Database connection errors
    /// - `DimensionMismatch` when the documents table was created for another dimension
    /// - Model provider configuration errors (missing API key, bad endpoint)
    /// - Reranker initialization errors
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Arc::new(ResilientModelClient::from_config(config)?);
        let store = PgVectorStore::from_config(config).await?;
        // Fail before any embedding work if the table disagrees with config
        store.verify_dimension().await?;
        let store = Arc::new(store);
        let reranker = build_reranker(config)?;
        Self::new(client, store, reranker, PipelineSettings::from_config(config))
    }

    /// Chunk, embed and persist `text` for `owner`; returns the number of chunks stored
    ///
    /// # Errors
    /// - Embedding errors (after retries), including dimension mismatches
    /// - Store errors; nothing is persisted when the batch insert fails
    pub async fn ingest(&self, text: &str, source: &str, owner: &UserId) -> Result<usize> {
        info!("Ingesting '{}' for {}", source, owner);

        let chunks = self.chunker.chunk_document(text, source);
        if chunks.is_empty() {
            info!("No content to ingest from '{}'", source);
            return Ok(0);
        }
        debug!("Split '{}' into {} chunks", source, chunks.len());

        let embeddings = self.embedding_stage.embed_chunks(&chunks).await?;
        let records: Vec<NewRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewRecord::from_chunk(chunk, embedding, owner.clone()))
            .collect();

        let stored = self.store.insert_batch(records).await?;
        info!("Stored {} chunks from '{}'", stored, source);
        Ok(stored)
    }

    /// Answer `query` from `owner`'s documents
    ///
    /// # Errors
    /// - Query embedding errors (after retries)
    /// - Store and reranker errors
    /// - Generation errors (after retries)
    pub async fn answer(&self, query: &str, owner: &UserId) -> Result<AnswerResult> {
        info!("Processing RAG query for {}: {}", owner, query);

        debug!("Step 1: Retrieving and reranking");
        let ranked = self
            .retriever
            .retrieve_and_rank(query, owner, self.top_k)
            .await?;

        debug!("Step 2: Synthesizing answer from {} sources", ranked.len());
        let result = self.synthesizer.synthesize(query, &ranked).await?;

        info!("RAG query completed with {} citations", result.citations.len());
        Ok(result)
    }

    #[must_use]
    pub const fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_service_is_send_and_sync() {
        assert_send_sync::<RagService>();
    }

    #[test]
    fn test_settings_follow_config() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 7;
        config.chunking.chunk_size = 1000;

        let settings = PipelineSettings::from_config(&config);

        assert_eq!(settings.retrieval.top_k, 7);
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.embedding_dimension, 768);
    }
}
