//! API routes for the RAG server

pub mod ingest;
pub mod query;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_body_size: usize) -> Router<AppState> {
    Router::new()
        .route("/ingest", post(ingest::ingest_documents))
        .route("/query", post(query::query_rag))
        .route("/info", get(info))
        .layer(DefaultBodyLimit::max(max_body_size))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();
    Json(json!({
        "name": "grounded-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document-grounded question answering with citations",
        "index_ready": state.service().index_ready(),
        "models": {
            "llm": config.llm.model,
            "embeddings": config.embeddings.model,
        },
        "retrieval": {
            "top_k": config.retrieval.top_k,
            "max_distance": config.retrieval.max_distance,
        },
        "endpoints": {
            "GET /health": "Liveness check",
            "POST /api/ingest": "Rebuild the index from a document directory",
            "POST /api/query": "Answer a question from the ingested documents",
            "GET /api/info": "Service information",
        }
    }))
}
