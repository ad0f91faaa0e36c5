//! # Scuba RAG CLI (`scuba`)
//!
//! ## Usage
//!
//! ```bash
//! scuba --config ./config/scuba.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scuba init` | Create the SQLite user database and schema |
//! | `scuba serve [--warm]` | Start the HTTP API |
//! | `scuba index` | Load, chunk and embed the knowledge base, then print stats |
//! | `scuba ask "<question>"` | Answer one question from the terminal |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `info,scuba_rag=debug`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use scuba_rag::config::{self, Config};
use scuba_rag::embedding::create_embedder;
use scuba_rag::generator::AnswerGenerator;
use scuba_rag::ingest::CorpusPipeline;
use scuba_rag::llm::create_chat_model;
use scuba_rag::{migrate, server};

const DEFAULT_LOG_FILTER: &str = "info,scuba_rag=debug";

#[derive(Parser)]
#[command(
    name = "scuba",
    about = "Scuba RAG: an authenticated chat assistant for diving in Colombia",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/scuba.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the user database and run schema migrations.
    Init,

    /// Start the HTTP server.
    Serve {
        /// Index the knowledge base at start-up instead of on the first message.
        #[arg(long)]
        warm: bool,
    },

    /// Build the embedding index and report what was indexed.
    Index,

    /// Ask a single question and print the answer.
    Ask { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Serve { warm } => {
            server::run_server(&cfg, warm).await?;
        }
        Commands::Index => {
            let pipeline = CorpusPipeline::new(&cfg, create_embedder(&cfg.embedding)?);
            let (_, stats) = pipeline.build_index().await?;
            println!(
                "Indexed {} documents into {} chunks ({} dims)",
                stats.documents, stats.chunks, stats.dims
            );
        }
        Commands::Ask { question } => {
            let answer = generator(&cfg)?.answer(&question).await;
            println!("{}", answer.content);
        }
    }

    Ok(())
}

fn generator(cfg: &Config) -> Result<AnswerGenerator> {
    let pipeline = CorpusPipeline::new(cfg, create_embedder(&cfg.embedding)?);
    Ok(AnswerGenerator::new(
        Arc::new(pipeline),
        create_chat_model(&cfg.llm)?,
    ))
}
