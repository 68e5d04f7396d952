//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "lumina")]
#[command(about = "Lumina CLI: ingest documents and ask grounded questions about them")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: level from config)
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (default: config.toml, then config.example.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the documents table and its indexes
    Init {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Chunk, embed and store a text file
    Ingest {
        /// Path of the text file to ingest
        file: PathBuf,
        /// Source label stored with every chunk (default: the file name)
        #[arg(short, long)]
        source: Option<String>,
        /// Owner of the ingested documents
        #[arg(short, long)]
        owner: String,
    },
    /// Ask a question about your documents
    Ask {
        /// The question to answer
        query: String,
        /// Whose documents to search
        #[arg(short, long)]
        owner: String,
        /// Print the answer and citations as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate and print the effective configuration
    CheckConfig,
}
