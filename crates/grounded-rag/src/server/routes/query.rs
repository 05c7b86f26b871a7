//! Query endpoint with agentic gating and citations

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::service::{NO_EVIDENCE_MESSAGE, REFUSAL_MESSAGE};
use crate::types::{QueryOutcome, QueryRequest, QueryResponse};

/// POST /api/query - Query the RAG system
pub async fn query_rag(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response> {
    let start = Instant::now();
    tracing::info!("Query: \"{}\"", request.query);

    let outcome = state.service().query(&request.query).await?;
    tracing::info!(
        "Query finished in {}ms ({})",
        start.elapsed().as_millis(),
        outcome.reason()
    );

    Ok(outcome_response(outcome))
}

/// Map a query outcome to its HTTP response
pub fn outcome_response(outcome: QueryOutcome) -> Response {
    match outcome {
        QueryOutcome::Answered { answer, reason } => Json(QueryResponse {
            answer: answer.answer,
            citations: answer.citations,
            reason: reason.to_string(),
        })
        .into_response(),
        QueryOutcome::Refused { reason } => Json(QueryResponse {
            answer: REFUSAL_MESSAGE.to_string(),
            citations: Vec::new(),
            reason: reason.to_string(),
        })
        .into_response(),
        QueryOutcome::InsufficientEvidence { .. } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "type": "insufficient_evidence",
                    "message": NO_EVIDENCE_MESSAGE,
                }
            })),
        )
            .into_response(),
    }
}
