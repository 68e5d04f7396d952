//! CLI command handlers

use std::path::Path;

use crate::cli::output::print_answer;
use crate::cli::output::print_config;
use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::models::UserId;
use crate::rag::RagService;
use crate::store::PgVectorStore;
use crate::AppConfig;
use crate::Result;

/// Handle schema initialization command
pub async fn handle_init_command(config: &AppConfig, force: bool) -> Result<()> {
    if !force {
        print_warning("This will create the pgvector extension and the documents table.");
        print_warning("This operation is safe - it uses CREATE IF NOT EXISTS.");
        println!("\nUse --force to proceed.");
        return Ok(());
    }

    print_info("🗄️  Initializing Lumina database...");
    let store = PgVectorStore::from_config(config).await?;
    store.init_schema().await?;
    print_success(&format!(
        "documents table ready (vector dimension {})",
        store.dimension()
    ));
    Ok(())
}

/// Handle ingest command
pub async fn handle_ingest_command(
    service: &RagService,
    file: &Path,
    source: Option<String>,
    owner: &str,
) -> Result<()> {
    let text = tokio::fs::read_to_string(file).await?;
    let source = source.unwrap_or_else(|| {
        file.file_name()
            .map_or_else(|| file.display().to_string(), |name| name.to_string_lossy().into_owned())
    });

    print_info(&format!("📄 Ingesting {} ({} chars)...", source, text.chars().count()));
    let stored = service.ingest(&text, &source, &UserId::from(owner)).await?;

    if stored == 0 {
        print_warning("Document is empty, nothing stored");
    } else {
        print_success(&format!("Stored {stored} chunks from {source}"));
    }
    Ok(())
}

/// Handle ask command
pub async fn handle_ask_command(
    service: &RagService,
    query: &str,
    owner: &str,
    json: bool,
) -> Result<()> {
    let result = service.answer(query, &UserId::from(owner)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_answer(&result);
    }
    Ok(())
}

/// Handle check-config command
pub fn handle_check_config_command(config: &AppConfig) -> Result<()> {
    config.validate()?;
    print_config(config);
    println!();
    print_success("Configuration is valid");
    Ok(())
}
