//! RAG Server binary
//!
//! Run with: cargo run -p grounded-rag --bin grounded-rag-server

use std::sync::Arc;

use grounded_rag::{config::RagConfig, server::RagServer, service::RagService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grounded_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(RagConfig::load()?);

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {}", config.storage.data_dir.display());
    tracing::info!("  - Index path: {}", config.storage.index_path.display());
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - LLM model: {}", config.llm.model);
    tracing::info!(
        "  - Chunking: size={} overlap={}",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!(
        "  - Retrieval: top_k={} max_distance={}",
        config.retrieval.top_k,
        config.retrieval.max_distance
    );

    let service = Arc::new(RagService::from_config(Arc::clone(&config))?);

    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    let healthy = service.llm().health_check().await.unwrap_or(false);
    if healthy {
        tracing::info!("Ollama is running");
    } else {
        tracing::warn!("Ollama not available at {}", config.llm.base_url);
        tracing::warn!("  Start it with `ollama serve` and pull the models:");
        tracing::warn!(
            "  ollama pull {} && ollama pull {}",
            config.llm.model,
            config.embeddings.model
        );
    }

    let server = RagServer::with_service(service);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/ingest    - Rebuild the index");
    println!("  POST /api/query     - Ask questions");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
