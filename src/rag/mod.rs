//! RAG (Retrieval-Augmented Generation) module
//!
//! This module answers questions from a user's own documents:
//! - Owner-scoped semantic retrieval using vector embeddings
//! - Candidate reranking
//! - Grounded answer generation with numbered citations
//!
//! # Examples
//!
//! ```rust,no_run
//! use lumina::config::AppConfig;
//! use lumina::models::UserId;
//! use lumina::rag::RagService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = RagService::from_config(&config).await?;
//!     let owner = UserId::from("alice");
//!
//!     service.ingest("The sky is blue.", "notes.txt", &owner).await?;
//!     let result = service.answer("What color is the sky?", &owner).await?;
//!     println!("Answer: {}", result.answer);
//!     println!("Sources: {}", result.citations.len());
//!
//!     Ok(())
//! }
//! ```

pub mod pipeline;
pub mod prompts;
pub mod reranker;
pub mod retriever;
pub mod synthesizer;

pub use pipeline::PipelineSettings;
pub use pipeline::RagService;
pub use prompts::cited_ids;
pub use prompts::NO_RELEVANT_INFORMATION;
pub use reranker::build_reranker;
pub use reranker::rerank_candidates;
#[cfg(feature = "cross-encoder")]
pub use reranker::CrossEncoderReranker;
pub use reranker::LexicalReranker;
pub use reranker::Reranker;
pub use retriever::Retriever;
pub use synthesizer::AnswerSynthesizer;
