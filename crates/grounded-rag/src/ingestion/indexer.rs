//! Full index rebuild: load, chunk, embed and publish

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, IngestionError, Result};
use crate::providers::{embed_in_batches, EmbeddingProvider};
use crate::retrieval::FlatIndex;
use crate::types::{Chunk, Document, IngestReport};

use super::chunker::TextChunker;
use super::loader::DocumentLoader;

/// Builds and publishes a fresh index from a document directory
///
/// Every run is a full rebuild. Nothing is written to the index path unless
/// the whole run succeeds.
pub struct IndexBuilder {
    chunker: TextChunker,
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    index_path: PathBuf,
}

impl IndexBuilder {
    /// Create a builder
    pub fn new(
        chunker: TextChunker,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chunker,
            loader,
            embedder,
            batch_size,
            index_path: index_path.into(),
        }
    }

    /// Create a builder from configuration
    pub fn from_config(
        config: &RagConfig,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        Ok(Self::new(
            chunker,
            loader,
            embedder,
            config.embeddings.batch_size,
            config.storage.index_path.clone(),
        ))
    }

    /// Where the index is published
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Load `data_dir`, build the index and publish it
    pub async fn ingest(&self, data_dir: &Path) -> Result<(IngestReport, FlatIndex)> {
        let started = Instant::now();
        tracing::info!("Starting ingestion from {}", data_dir.display());

        let loader = Arc::clone(&self.loader);
        let dir = data_dir.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || loader.load(&dir))
            .await
            .map_err(|e| Error::internal(format!("document load task failed: {}", e)))?;

        let document_count = documents.len();
        let index = self.build(data_dir, documents).await?;
        let chunk_count = index.len();

        let index = {
            let path = self.index_path.clone();
            tokio::task::spawn_blocking(move || index.persist(&path).map(|()| index))
                .await
                .map_err(|e| Error::internal(format!("index persist task failed: {}", e)))??
        };

        tracing::info!(
            "Ingestion complete: {} document(s), {} chunk(s) in {:.2}s",
            document_count,
            chunk_count,
            started.elapsed().as_secs_f64()
        );

        let report = IngestReport {
            index_path: self.index_path.clone(),
            documents: document_count,
            chunks: chunk_count,
        };
        Ok((report, index))
    }

    /// Chunk and embed documents loaded from `data_dir` into an index
    pub async fn build(&self, data_dir: &Path, documents: Vec<Document>) -> Result<FlatIndex> {
        if documents.is_empty() {
            return Err(IngestionError::NoDocuments {
                dir: data_dir.to_path_buf(),
            }
            .into());
        }

        let document_count = documents.len();
        let chunker = self.chunker.clone();
        let chunks: Vec<Chunk> =
            tokio::task::spawn_blocking(move || chunker.chunk_documents(&documents))
                .await
                .map_err(|e| Error::internal(format!("chunking task failed: {}", e)))?;

        if chunks.is_empty() {
            return Err(IngestionError::NoChunks {
                documents: document_count,
            }
            .into());
        }
        tracing::info!(
            "Created {} chunk(s) from {} document(s)",
            chunks.len(),
            document_count
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embed_in_batches(self.embedder.as_ref(), &texts, self.batch_size).await?;
        tracing::info!(
            "Embedded {} chunk(s) with {}/{}",
            vectors.len(),
            self.embedder.name(),
            self.embedder.model()
        );

        FlatIndex::build(chunks, vectors, self.embedder.model())
    }
}
