pub mod chunker;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod store;


pub use config::AppConfig;
pub use errors::*;
pub use rag::RagService;
