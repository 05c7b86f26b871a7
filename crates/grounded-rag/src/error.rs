//! Error types for the grounded RAG pipeline

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort an ingestion run before anything is published
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The loader produced no documents at all
    #[error("No documents were loaded from '{}'. Ensure the directory exists and contains supported files.", dir.display())]
    NoDocuments { dir: PathBuf },

    /// Documents were loaded but chunking produced nothing
    #[error("Chunking {documents} document(s) produced no chunks. Check the chunking configuration.")]
    NoChunks { documents: usize },
}

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ingestion produced nothing indexable
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// Query issued before an index was built
    #[error("Index not found at '{}'. Run ingestion first.", path.display())]
    IndexNotFound { path: PathBuf },

    /// Generation was attempted without any retrieved evidence
    #[error("No retrieved context available for answer generation")]
    EmptyEvidence,

    /// Network failure or timeout talking to a model backend
    #[error("{backend} communication failed: {message}")]
    BackendCommunication {
        backend: String,
        message: String,
        timed_out: bool,
    },

    /// The backend answered but the payload was empty or malformed
    #[error("{backend} returned an invalid response: {message}")]
    InvalidBackendResponse { backend: String, message: String },

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a backend communication error
    pub fn communication(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendCommunication {
            backend: backend.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a backend timeout error
    pub fn timeout(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendCommunication {
            backend: backend.into(),
            message: message.into(),
            timed_out: true,
        }
    }

    /// Create an invalid backend response error
    pub fn invalid_response(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBackendResponse {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendCommunication { .. })
    }

    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Ingestion(IngestionError::NoDocuments { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "no_documents")
            }
            Error::Ingestion(IngestionError::NoChunks { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "no_chunks")
            }
            Error::IndexNotFound { .. } => (StatusCode::CONFLICT, "index_not_found"),
            Error::EmptyEvidence => (StatusCode::INTERNAL_SERVER_ERROR, "empty_evidence"),
            Error::BackendCommunication { timed_out: true, .. } => {
                (StatusCode::GATEWAY_TIMEOUT, "backend_timeout")
            }
            Error::BackendCommunication { .. } => (StatusCode::BAD_GATEWAY, "backend_error"),
            Error::InvalidBackendResponse { .. } => {
                (StatusCode::BAD_GATEWAY, "invalid_backend_response")
            }
            Error::VectorIndex(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_index_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "json_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
