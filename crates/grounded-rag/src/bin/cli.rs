//! Command line interface for ingestion and one-off queries
//!
//! Run with: cargo run -p grounded-rag --features cli --bin grounded-rag -- --help

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use grounded_rag::{
    config::RagConfig,
    service::{RagService, NO_EVIDENCE_MESSAGE, REFUSAL_MESSAGE},
    QueryOutcome,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grounded-rag", version, about = "Document-grounded question answering")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from a document directory
    Ingest {
        /// Directory to ingest (defaults to storage.data_dir)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Ask a question against the current index
    Query {
        /// The question
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grounded_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(RagConfig::load()?);
    let service = RagService::from_config(config)?;

    match cli.command {
        Command::Ingest { data_dir } => {
            let report = service.ingest(data_dir).await?;
            println!(
                "Indexed {} chunk(s) from {} document(s) into {}",
                report.chunks,
                report.documents,
                report.index_path.display()
            );
        }
        Command::Query { query } => match service.query(&query).await? {
            QueryOutcome::Answered { answer, .. } => println!("{}", answer.answer),
            QueryOutcome::Refused { reason } => {
                println!("{}", REFUSAL_MESSAGE);
                eprintln!("({})", reason);
            }
            QueryOutcome::InsufficientEvidence { .. } => {
                eprintln!("{}", NO_EVIDENCE_MESSAGE);
                return Ok(ExitCode::from(2));
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
