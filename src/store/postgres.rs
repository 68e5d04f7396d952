//! PostgreSQL + pgvector implementation of the vector store

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use sqlx::Row;
use tracing::debug;
use tracing::info;
use uuid::Uuid;

use super::VectorStore;
use crate::config::AppConfig;
use crate::errors::LuminaError;
use crate::errors::Result;
use crate::models::NewRecord;
use crate::models::RecordMetadata;
use crate::models::StoredRecord;
use crate::models::UserId;

/// `documents` table store; every query is filtered by `user_id`
#[derive(Debug, Clone)]
pub struct PgVectorStore {
    pool: PgPool,
    dimension: usize,
}

impl PgVectorStore {
    pub fn new(pool: PgPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    /// Create a connection pool from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections())
            .min_connections(config.min_connections())
            .acquire_timeout(std::time::Duration::from_secs(config.connection_timeout()))
            .connect(config.database_url())
            .await?;
        Ok(Self::new(pool, config.embedding_dimension()))
    }

    /// Get a reference to the database pool for raw queries
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create the pgvector extension, the `documents` table and its indexes
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing documents schema (dimension {})", self.dimension);

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        // The dimension is part of the column type and cannot be bound
        let create_table = format!(
            r"
            CREATE TABLE IF NOT EXISTS documents (
                id UUID PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL,
                embedding vector({}) NOT NULL,
                user_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
            self.dimension
        );
        sqlx::query(&create_table).execute(&self.pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_user_id ON documents (user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_embedding ON documents \
             USING hnsw (embedding vector_cosine_ops)",
        )
        .execute(&self.pool)
        .await?;

        self.verify_dimension().await
    }

    /// Compare the `embedding` column's declared dimension with configuration
    pub async fn verify_dimension(&self) -> Result<()> {
        // atttypmod holds the declared dimension for vector columns
        let declared: Option<i32> = sqlx::query_scalar(
            r"
            SELECT a.atttypmod
            FROM pg_attribute a
            JOIN pg_class c ON a.attrelid = c.oid
            WHERE c.relname = 'documents' AND a.attname = 'embedding'
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        match declared {
            Some(dim) if dim > 0 && dim as usize != self.dimension => {
                Err(LuminaError::DimensionMismatch {
                    expected: dim as usize,
                    actual: self.dimension,
                })
            }
            Some(_) => Ok(()),
            None => Err(LuminaError::Store(
                "documents table not found. Run: lumina init".to_string(),
            )),
        }
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len == self.dimension {
            Ok(())
        } else {
            Err(LuminaError::DimensionMismatch {
                expected: self.dimension,
                actual: len,
            })
        }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn insert_batch(&self, records: Vec<NewRecord>) -> Result<usize> {
        for record in &records {
            self.check_dimension(record.embedding.len())?;
        }
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len();
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r"
                INSERT INTO documents (id, content, metadata, embedding, user_id)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(Uuid::new_v4())
            .bind(record.content)
            .bind(Json(record.metadata))
            .bind(Vector::from(record.embedding))
            .bind(record.owner.as_str())
            .execute(&mut *tx)
            .await?;
        }

        // Dropping the transaction on any error above rolls everything back
        tx.commit().await?;
        debug!("Inserted {} records into documents", count);
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

        let rows = sqlx::query(
            r"
            SELECT id, content, metadata, user_id, created_at,
                   (1 - (embedding <=> $1))::REAL AS similarity
            FROM documents
            WHERE user_id = $2
                AND 1 - (embedding <=> $1) > $3
            ORDER BY embedding <=> $1
            LIMIT $4
            ",
        )
        .bind(Vector::from(query_vector.to_vec()))
        .bind(owner.as_str())
        .bind(f64::from(similarity_threshold))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<StoredRecord> {
                let metadata: Json<RecordMetadata> = row.try_get("metadata")?;
                let owner: String = row.try_get("user_id")?;
                let created_at: DateTime<Utc> = row.try_get("created_at")?;
                Ok(StoredRecord {
                    id: row.try_get("id")?,
                    content: row.try_get("content")?,
                    metadata: metadata.0,
                    owner: UserId::from(owner),
                    similarity: row.try_get("similarity")?,
                    created_at: Some(created_at),
                })
            })
            .collect()
    }
}
