//! grounded-rag: document-grounded question answering with citations
//!
//! Documents are loaded from a directory, split into overlapping chunks,
//! embedded and published as a flat vector index. At query time an agent
//! gate decides whether retrieval is warranted, the retriever keeps only
//! chunks under a distance threshold, and the generator answers from that
//! evidence alone, appending a citation line.

pub mod agent;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, IngestionError, Result};
pub use service::RagService;
pub use types::{
    document::{Chunk, ChunkMetadata, Document, FileType},
    response::{Citation, GroundedAnswer, QueryOutcome, QueryResponse, RetrievalResult},
};
