//! In-process vector store with exact cosine search

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::cosine_similarity;
use super::VectorStore;
use crate::errors::LuminaError;
use crate::errors::Result;
use crate::models::NewRecord;
use crate::models::RecordMetadata;
use crate::models::StoredRecord;
use crate::models::UserId;

#[derive(Debug, Clone)]
struct Row {
    id: Uuid,
    content: String,
    metadata: RecordMetadata,
    embedding: Vec<f32>,
    owner: UserId,
    created_at: chrono::DateTime<Utc>,
}

/// Exact-search store for tests and small local collections
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    dimension: Option<usize>,
    rows: RwLock<Vec<Row>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject vectors of any other dimension, like a typed `vector(n)` column
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            rows: RwLock::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != len => Err(LuminaError::DimensionMismatch {
                expected,
                actual: len,
            }),
            _ => Ok(()),
        }
    }
}

fn poisoned<T>(_: T) -> LuminaError {
    LuminaError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_batch(&self, records: Vec<NewRecord>) -> Result<usize> {
        // Validate everything before writing anything
        for record in &records {
            self.check_dimension(record.embedding.len())?;
        }

        let now = Utc::now();
        let count = records.len();
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.extend(records.into_iter().map(|record| Row {
            id: Uuid::new_v4(),
            content: record.content,
            metadata: record.metadata,
            embedding: record.embedding,
            owner: record.owner,
            created_at: now,
        }));

        debug!("Inserted {} records into in-memory store", count);
        Ok(count)
    }

    async fn search(
        &self,
        owner: &UserId,
        query_vector: &[f32],
        similarity_threshold: f32,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        self.check_dimension(query_vector.len())?;
        let rows = self.rows.read().map_err(poisoned)?;

        let mut matches: Vec<StoredRecord> = rows
            .iter()
            .filter(|row| &row.owner == owner)
            .filter_map(|row| {
                let similarity = cosine_similarity(&row.embedding, query_vector);
                (similarity > similarity_threshold).then(|| StoredRecord {
                    id: row.id,
                    content: row.content.clone(),
                    metadata: row.metadata.clone(),
                    owner: row.owner.clone(),
                    similarity,
                    created_at: Some(row.created_at),
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(limit);
        Ok(matches)
    }
}
