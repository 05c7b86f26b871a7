//! Document ingestion pipeline: load, chunk, embed, publish

mod chunker;
mod indexer;
mod loader;

pub use chunker::{TextChunker, DEFAULT_SEPARATORS};
pub use indexer::IndexBuilder;
pub use loader::{DirectoryLoader, DocumentLoader};
