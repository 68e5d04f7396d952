//! Vector store gateway
//!
//! Persists chunk records and runs owner-scoped nearest-neighbour search.
//! Owner scoping is mandatory in every implementation; the retriever's own
//! owner filter sits on top of it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
pub use memory::InMemoryVectorStore;
pub use postgres::PgVectorStore;

use crate::errors::Result;
use crate::models::NewRecord;
use crate::models::StoredRecord;
use crate::models::UserId;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist all records or none of them; returns how many were written
    async fn insert_batch(&self, records: Vec<NewRecord>) -> Result<usize>;

    /// Records owned by `owner` with cosine similarity above
    /// `similarity_threshold`, most similar first, at most `limit`
    async fn search(
        &self,
        owner: &UserId,
        query_vector: &[f32],
        similarity_threshold: f32,
        limit: usize,
    ) -> Result<Vec<StoredRecord>>;
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }
}
