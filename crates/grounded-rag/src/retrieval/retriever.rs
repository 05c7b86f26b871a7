//! Query-time similarity search with distance-threshold filtering

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::RetrievalResult;

use super::index::FlatIndex;

/// Anything that can turn a query into filtered evidence
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    /// Results sorted by ascending distance, all within the threshold
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>>;
}

/// Retriever over a persisted [`FlatIndex`]
///
/// The index is loaded on first use and cached for the life of the
/// instance. Concurrent first queries share a single load.
pub struct Retriever {
    index_path: PathBuf,
    /// Candidates requested from the index
    top_k: usize,
    /// Inclusive upper bound on accepted distance
    max_distance: f32,
    embedder: Arc<dyn EmbeddingProvider>,
    index: OnceCell<Arc<FlatIndex>>,
}

impl Retriever {
    /// Create a retriever that loads `index_path` lazily
    pub fn new(
        index_path: impl Into<PathBuf>,
        top_k: usize,
        max_distance: f32,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            index_path: index_path.into(),
            top_k,
            max_distance,
            embedder,
            index: OnceCell::new(),
        }
    }

    /// Create a retriever from configuration
    pub fn from_config(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(
            config.storage.index_path.clone(),
            config.retrieval.top_k,
            config.retrieval.max_distance,
            embedder,
        )
    }

    /// Create a retriever over an already built index
    pub fn with_index(
        index: Arc<FlatIndex>,
        index_path: impl Into<PathBuf>,
        top_k: usize,
        max_distance: f32,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            index_path: index_path.into(),
            top_k,
            max_distance,
            embedder,
            index: OnceCell::from(index),
        }
    }

    /// Path the index is read from
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Whether the index has been loaded
    pub fn is_loaded(&self) -> bool {
        self.index.initialized()
    }

    /// The cached index, loading it on first call
    pub async fn index(&self) -> Result<Arc<FlatIndex>> {
        let index = self
            .index
            .get_or_try_init(|| async {
                let path = self.index_path.clone();
                tracing::info!("Loading index from {}", path.display());

                let index = tokio::task::spawn_blocking(move || FlatIndex::load(&path))
                    .await
                    .map_err(|e| Error::internal(format!("index load task failed: {}", e)))??;
                Ok::<_, Error>(Arc::new(index))
            })
            .await?;

        Ok(Arc::clone(index))
    }
}

/// Keep results with `distance <= max_distance`, preserving order
pub fn filter_by_distance(results: Vec<RetrievalResult>, max_distance: f32) -> Vec<RetrievalResult> {
    results
        .into_iter()
        .filter(|r| r.distance <= max_distance)
        .collect()
}

#[async_trait]
impl ChunkRetriever for Retriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            tracing::debug!("Empty query, skipping retrieval");
            return Ok(Vec::new());
        }

        let index = self.index().await?;
        let embedding = self.embedder.embed(query).await?;
        let candidates = index.search(&embedding, self.top_k)?;

        let candidate_count = candidates.len();
        let results = filter_by_distance(candidates, self.max_distance);

        tracing::info!(
            "Retrieved {} candidate(s), {} within distance {}",
            candidate_count,
            results.len(),
            self.max_distance
        );
        for result in &results {
            tracing::debug!(
                "  {} chunk {} distance={:.4}",
                result.chunk.source(),
                result.chunk.chunk_id(),
                result.distance
            );
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata, FileType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds a text as `[len, 0]`
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.chars().count() as f32, 0.0])
                .collect())
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "counting-v1"
        }
    }

    fn chunk(id: u64, text: &str) -> Chunk {
        Chunk {
            content: text.to_string(),
            metadata: ChunkMetadata {
                source: format!("doc{}.txt", id),
                path: format!("data/doc{}.txt", id),
                file_type: FileType::Txt,
                page: None,
                chunk_id: id,
                start_index: Some(0),
            },
        }
    }

    /// Chunks at x = 3, 4, 5, 10
    fn persisted_index(dir: &Path) -> PathBuf {
        let path = dir.join("index");
        FlatIndex::build(
            vec![chunk(0, "three"), chunk(1, "four"), chunk(2, "five"), chunk(3, "ten")],
            vec![
                vec![3.0, 0.0],
                vec![4.0, 0.0],
                vec![5.0, 0.0],
                vec![10.0, 0.0],
            ],
            "counting-v1",
        )
        .unwrap()
        .persist(&path)
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_results_are_thresholded_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = persisted_index(dir.path());
        let embedder = CountingEmbedder::new();

        // Query "abcd" embeds to [4, 0]: distances 1, 0, 1, 36
        let retriever = Retriever::new(&path, 3, 1.0, embedder.clone());
        let results = retriever.retrieve("abcd").await.unwrap();

        let ids: Vec<u64> = results.iter().map(|r| r.chunk.chunk_id()).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert!(results.iter().all(|r| r.distance <= 1.0));
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_top_k_and_threshold_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = persisted_index(dir.path());

        let narrow = Retriever::new(&path, 1, 100.0, CountingEmbedder::new());
        assert_eq!(narrow.retrieve("abcd").await.unwrap().len(), 1);

        let strict = Retriever::new(&path, 4, 0.5, CountingEmbedder::new());
        let results = strict.retrieve("abcd").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "four");

        let none = Retriever::new(&path, 4, 0.5, CountingEmbedder::new());
        assert!(none.retrieve("abcdefg").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_skips_embedding_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let retriever = Retriever::new(dir.path().join("missing"), 4, 1.0, embedder.clone());

        assert!(retriever.retrieve("   \n").await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(!retriever.is_loaded());
    }

    #[tokio::test]
    async fn test_missing_index_is_index_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let retriever = Retriever::new(dir.path().join("missing"), 4, 1.0, embedder.clone());

        let err = retriever.retrieve("anything").await.unwrap_err();
        assert!(matches!(err, Error::IndexNotFound { .. }));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_index_is_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = persisted_index(dir.path());
        let retriever = Arc::new(Retriever::new(&path, 2, 100.0, CountingEmbedder::new()));

        let first = retriever.index().await.unwrap();

        // Removing the files proves later queries use the cached copy
        std::fs::remove_dir_all(&path).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let retriever = Arc::clone(&retriever);
                tokio::spawn(async move { retriever.retrieve("abc").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().len(), 2);
        }

        let again = retriever.index().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_filter_is_inclusive() {
        let results = vec![
            RetrievalResult {
                chunk: chunk(0, "a"),
                distance: 0.45,
            },
            RetrievalResult {
                chunk: chunk(1, "b"),
                distance: 0.4501,
            },
        ];
        let kept = filter_by_distance(results, 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk.chunk_id(), 0);
    }
}
