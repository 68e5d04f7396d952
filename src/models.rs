//! Records flowing between pipeline stages
//!
//! Each stage boundary has its own type; conversions between them are explicit.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Fixed-length vector representation of a chunk or a query
pub type EmbeddingVector = Vec<f32>;

/// Identity under which documents are ingested and retrieved
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A bounded slice of a source document, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub source: String,
}

/// Provenance stored alongside every record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source: String,
    pub chunk_index: usize,
}

/// A chunk with its embedding, ready to be persisted for `owner`
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub content: String,
    pub metadata: RecordMetadata,
    pub embedding: EmbeddingVector,
    pub owner: UserId,
}

impl NewRecord {
    pub fn from_chunk(chunk: Chunk, embedding: EmbeddingVector, owner: UserId) -> Self {
        Self {
            metadata: RecordMetadata {
                source: chunk.source,
                chunk_index: chunk.index,
            },
            content: chunk.text,
            embedding,
            owner,
        }
    }
}

/// A persisted record as returned by a similarity search
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: Uuid,
    pub content: String,
    pub metadata: RecordMetadata,
    pub owner: UserId,
    /// Cosine similarity to the query vector
    pub similarity: f32,
    pub created_at: Option<DateTime<Utc>>,
}

/// Where a candidate's relevance score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    VectorSimilarity,
    CrossEncoder,
    /// Term-overlap fallback scorer
    Lexical,
}

/// A retrieved record projected for ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub text: String,
    pub metadata: RecordMetadata,
    pub relevance_score: f32,
    pub score_source: ScoreSource,
}

impl From<StoredRecord> for Candidate {
    fn from(record: StoredRecord) -> Self {
        Self {
            id: record.id,
            text: record.content,
            metadata: record.metadata,
            relevance_score: record.similarity,
            score_source: ScoreSource::VectorSimilarity,
        }
    }
}

/// A source passage backing an answer, numbered in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the ranked list
    pub id: usize,
    pub content: String,
    pub metadata: RecordMetadata,
}

impl Citation {
    pub fn from_candidate(position: usize, candidate: &Candidate) -> Self {
        Self {
            id: position + 1,
            content: candidate.text.clone(),
            metadata: candidate.metadata.clone(),
        }
    }
}

/// Terminal artifact of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub citations: Vec<Citation>,
}
