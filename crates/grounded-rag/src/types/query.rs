//! Request payloads

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The user's question
    pub query: String,
}

/// Ingestion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Directory to ingest instead of the configured data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}
