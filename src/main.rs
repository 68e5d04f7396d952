use clap::Parser;
use lumina::cli::handle_ask_command;
use lumina::cli::handle_check_config_command;
use lumina::cli::handle_ingest_command;
use lumina::cli::handle_init_command;
use lumina::cli::print_error;
use lumina::cli::Cli;
use lumina::cli::Commands;
use lumina::config::AppConfig;
use lumina::RagService;
use lumina::Result;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging
    if cli.verbose {
        lumina::logging::init_logging_with_level("debug")?;
    } else {
        lumina::logging::init_logging_with_config(&config)?;
    }
    info!("Configuration loaded successfully");

    // Execute the requested command
    match cli.command {
        Commands::Init { force } => handle_init_command(&config, force).await?,
        Commands::Ingest {
            file,
            source,
            owner,
        } => {
            let service = RagService::from_config(&config).await?;
            handle_ingest_command(&service, &file, source, &owner).await?;
        }
        Commands::Ask { query, owner, json } => {
            let service = RagService::from_config(&config).await?;
            handle_ask_command(&service, &query, &owner, json).await?;
        }
        Commands::CheckConfig => handle_check_config_command(&config)?,
    }

    Ok(())
}
