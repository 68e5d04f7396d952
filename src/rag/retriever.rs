//! Owner-scoped semantic retrieval followed by reranking

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::reranker::rerank_candidates;
use super::reranker::Reranker;
use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingStage;
use crate::errors::Result;
use crate::models::Candidate;
use crate::models::UserId;
use crate::store::VectorStore;

/// Default minimum cosine similarity for a record to enter the candidate pool
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Candidates fetched per requested result, before reranking
pub const DEFAULT_OVERFETCH_FACTOR: usize = 5;

/// Retriever for the documents of a single owner
pub struct Retriever {
    embedding_stage: Arc<EmbeddingStage>,
    store: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    similarity_threshold: f32,
    overfetch_factor: usize,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(
        embedding_stage: Arc<EmbeddingStage>,
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        Self {
            embedding_stage,
            store,
            reranker,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, config: &RetrievalConfig) -> Self {
        self.similarity_threshold = config.similarity_threshold;
        self.overfetch_factor = config.overfetch_factor.max(1);
        self
    }

    pub const fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Semantic search for `owner`, reranked down to at most `top_k` candidates
    pub async fn retrieve_and_rank(
        &self,
        query: &str,
        owner: &UserId,
        top_k: usize,
    ) -> Result<Vec<Candidate>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        debug!("Retrieving candidates for owner {}: {}", owner, query);

        let query_vector = self.embedding_stage.embed_query(query).await?;
        let limit = top_k.saturating_mul(self.overfetch_factor);
        let records = self
            .store
            .search(owner, &query_vector, self.similarity_threshold, limit)
            .await?;

        let fetched = records.len();
        let pool: Vec<Candidate> = records
            .into_iter()
            .filter(|record| &record.owner == owner)
            .map(Candidate::from)
            .collect();
        if pool.len() < fetched {
            warn!(
                "Dropped {} records not owned by {} from search results",
                fetched - pool.len(),
                owner
            );
        }

        if pool.is_empty() {
            debug!("No candidates above similarity {}", self.similarity_threshold);
            return Ok(pool);
        }

        debug!("Reranking {} candidates", pool.len());
        rerank_candidates(self.reranker.as_ref(), query, pool, top_k).await
    }
}
