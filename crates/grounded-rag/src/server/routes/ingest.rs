//! Ingestion endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{IngestReport, IngestRequest};

/// POST /api/ingest - Rebuild the index
///
/// An empty body or `{}` ingests the configured data directory.
pub async fn ingest_documents(
    State(state): State<AppState>,
    body: Option<Json<IngestRequest>>,
) -> Result<Json<IngestReport>> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    match &request.data_dir {
        Some(dir) => tracing::info!("Ingest requested for {}", dir.display()),
        None => tracing::info!("Ingest requested for the configured data directory"),
    }

    let report = state.service().ingest(request.data_dir).await?;
    Ok(Json(report))
}
