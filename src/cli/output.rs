//! CLI output formatting utilities
//!
//! This module provides consistent output formatting for the Lumina CLI

use crate::models::AnswerResult;
use crate::AppConfig;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// Returns the string with a "..." suffix if it was truncated.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Print an answer followed by its numbered sources
pub fn print_answer(result: &AnswerResult) {
    println!("💡 Answer:");
    println!("{}", result.answer.trim());

    if result.citations.is_empty() {
        return;
    }

    println!();
    println!("📚 Sources ({}):", result.citations.len());
    for citation in &result.citations {
        let preview = truncate_str(&citation.content.replace('\n', " "), 100);
        println!(
            "  [{}] {} (chunk {}): {}",
            citation.id, citation.metadata.source, citation.metadata.chunk_index, preview
        );
    }
}

/// Print configuration
pub fn print_config(config: &AppConfig) {
    println!("📋 Lumina Configuration:");
    println!();

    println!("🗄️  Database:");
    println!("  URL: {}", mask_database_url(config.database_url()));
    println!("  Max connections: {}", config.max_connections());
    println!("  Min connections: {}", config.min_connections());
    println!("  Connection timeout: {}s", config.connection_timeout());
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.logging.level);
    println!();

    println!("🤖 LLM:");
    println!("  Provider: {:?}", config.llm.provider);
    println!("  Endpoint: {}", config.llm_endpoint());
    println!("  Model: {}", config.llm_model());
    println!(
        "  Key: {}",
        if config.llm.api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("  Request timeout: {:?}", config.request_timeout());
    println!();

    println!("🧠 Embeddings:");
    println!("  Model: {}", config.embedding_model());
    println!("  Dimension: {}", config.embedding_dimension());
    println!(
        "  Batches: {} texts, {}ms apart",
        config.embeddings.batch_size, config.embeddings.batch_pause_ms
    );
    println!(
        "  Progress pause: {}ms every {} chunks",
        config.embeddings.progress_pause_ms, config.embeddings.progress_every
    );
    println!();

    println!("🔄 Retry:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!("  Initial delay: {}ms", config.retry.initial_delay_ms);
    println!("  Max delay: {}ms", config.retry.max_delay_ms);
    println!();

    println!("✂️  Chunking:");
    println!("  Chunk size: {}", config.chunking.chunk_size);
    println!("  Overlap: {}", config.chunking.chunk_overlap);
    println!();

    println!("🔍 Retrieval:");
    println!("  Top k: {}", config.retrieval.top_k);
    println!("  Similarity threshold: {}", config.retrieval.similarity_threshold);
    println!("  Over-fetch factor: {}", config.retrieval.overfetch_factor);
    println!("  Reranker: {:?}", config.retrieval.reranker);
}

/// Mask database URL for logging (hide password)
fn mask_database_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            format!(
                "{}://{}@{}:{}{}",
                parsed.scheme(),
                parsed.username(),
                host,
                parsed.port().unwrap_or(5432),
                parsed.path()
            )
        } else {
            "***masked***".to_string()
        }
    } else {
        "***invalid***".to_string()
    }
}

/// Print colored output functions
pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("❌ {msg}");
}
