//! Core types for the RAG system

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkMetadata, Document, DocumentMetadata, FileType};
pub use query::{IngestRequest, QueryRequest};
pub use response::{
    AgentDecision, Citation, DecisionReason, GroundedAnswer, IngestReport, QueryOutcome,
    QueryResponse, RetrievalResult,
};
