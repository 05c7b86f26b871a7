//! The ingest / query interface exposed to the HTTP layer and CLI

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::agent::AgentController;
use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::AnswerGenerator;
use crate::ingestion::{DirectoryLoader, DocumentLoader, IndexBuilder};
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaEmbedder, OllamaLlm};
use crate::retrieval::{ChunkRetriever, FlatIndex, Retriever};
use crate::types::{IngestReport, QueryOutcome};

/// Answer returned when retrieval is skipped
pub const REFUSAL_MESSAGE: &str =
    "I can only answer grounded questions based on the ingested documents.";

/// Message for queries with no evidence under the distance threshold
pub const NO_EVIDENCE_MESSAGE: &str =
    "No supporting evidence found for this query. Ingest documents or refine the question.";

/// Grounded question answering over an ingested corpus
pub struct RagService {
    config: Arc<RagConfig>,
    embedder: Arc<dyn EmbeddingProvider>,
    loader: Arc<dyn DocumentLoader>,
    generator: AnswerGenerator,
    /// Replaced wholesale after every successful ingestion
    retriever: RwLock<Arc<Retriever>>,
    /// One ingestion at a time
    ingest_lock: Mutex<()>,
}

impl RagService {
    /// Create a service from explicit dependencies
    pub fn new(
        config: Arc<RagConfig>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Result<Self> {
        config.validate()?;

        let retriever = Retriever::from_config(&config, Arc::clone(&embedder));
        Ok(Self {
            config,
            embedder,
            loader,
            generator: AnswerGenerator::new(llm),
            retriever: RwLock::new(Arc::new(retriever)),
            ingest_lock: Mutex::new(()),
        })
    }

    /// Create a service backed by Ollama and the filesystem loader
    pub fn from_config(config: Arc<RagConfig>) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(&config.embeddings)?);
        let llm: Arc<dyn LlmProvider> = Arc::new(OllamaLlm::new(&config.llm)?);
        Self::new(config, embedder, llm, Arc::new(DirectoryLoader::new()))
    }

    /// Active configuration
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Language model used for answers
    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        self.generator.llm()
    }

    /// Embedding model used for chunks and queries
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Current retriever
    pub fn retriever(&self) -> Arc<Retriever> {
        Arc::clone(&self.retriever.read())
    }

    /// Whether an index has been published at the configured path
    pub fn index_ready(&self) -> bool {
        FlatIndex::is_present(&self.config.storage.index_path)
    }

    /// Rebuild the index from `data_dir`, or the configured data directory
    ///
    /// On success later queries use the new index; on failure the previous
    /// index stays in place.
    pub async fn ingest(&self, data_dir: Option<PathBuf>) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;

        let dir = data_dir.unwrap_or_else(|| self.config.storage.data_dir.clone());
        let builder = IndexBuilder::from_config(
            &self.config,
            Arc::clone(&self.loader),
            Arc::clone(&self.embedder),
        )?;
        let (report, index) = builder.ingest(&dir).await?;

        let retriever = Retriever::with_index(
            Arc::new(index),
            report.index_path.clone(),
            self.config.retrieval.top_k,
            self.config.retrieval.max_distance,
            Arc::clone(&self.embedder),
        );
        *self.retriever.write() = Arc::new(retriever);

        Ok(report)
    }

    /// Answer a query, refuse it, or report missing evidence
    pub async fn query(&self, query: &str) -> Result<QueryOutcome> {
        let retriever: Arc<dyn ChunkRetriever> = self.retriever();
        let agent = AgentController::new(retriever);

        let (decision, results) = agent.retrieve(query).await?;
        if !decision.require_retrieval {
            return Ok(QueryOutcome::Refused {
                reason: decision.reason,
            });
        }

        if results.is_empty() {
            tracing::info!("No evidence under the distance threshold");
            return Ok(QueryOutcome::InsufficientEvidence {
                reason: decision.reason,
            });
        }

        let answer = self.generator.generate(query, &results).await?;
        Ok(QueryOutcome::Answered {
            answer,
            reason: decision.reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::DecisionReason;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One dimension per keyword; a text scores 1.0 in each keyword it mentions
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    const KEYWORDS: &[&str] = &["sky", "ocean", "forest"];

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    KEYWORDS
                        .iter()
                        .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }

        fn name(&self) -> &str {
            "keyword"
        }

        fn model(&self) -> &str {
            "keyword-v1"
        }
    }

    struct EchoLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Grounded reply.".to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-v1"
        }
    }

    struct Harness {
        service: RagService,
        embedder: Arc<KeywordEmbedder>,
        llm: Arc<EchoLlm>,
        data_dir: PathBuf,
        dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();

        let mut config = RagConfig::default();
        config.storage.data_dir = data_dir.clone();
        config.storage.index_path = dir.path().join("index");

        let embedder = Arc::new(KeywordEmbedder {
            calls: AtomicUsize::new(0),
        });
        let llm = Arc::new(EchoLlm {
            calls: AtomicUsize::new(0),
        });
        let service = RagService::new(
            Arc::new(config),
            embedder.clone(),
            llm.clone(),
            Arc::new(DirectoryLoader::new()),
        )
        .unwrap();

        Harness {
            service,
            embedder,
            llm,
            data_dir,
            dir,
        }
    }

    #[tokio::test]
    async fn test_small_talk_is_refused_without_backends() {
        let h = harness();

        let outcome = h.service.query("Thanks!").await.unwrap();
        assert!(matches!(
            outcome,
            QueryOutcome::Refused {
                reason: DecisionReason::SmallTalk
            }
        ));
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_before_ingest_is_index_not_found() {
        let h = harness();
        assert!(!h.service.index_ready());

        let err = h.service.query("What about the sky?").await.unwrap_err();
        assert!(matches!(err, Error::IndexNotFound { .. }));
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ingest_then_answer() {
        let h = harness();
        std::fs::write(h.data_dir.join("sky.txt"), "The sky is blue.").unwrap();
        std::fs::write(h.data_dir.join("forest.txt"), "The forest is dense.").unwrap();

        let report = h.service.ingest(None).await.unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 2);
        assert!(h.service.index_ready());

        match h.service.query("Tell me about the sky").await.unwrap() {
            QueryOutcome::Answered { answer, reason } => {
                assert_eq!(reason, DecisionReason::DocumentGrounded);
                assert_eq!(answer.citations.len(), 1);
                assert_eq!(answer.citations[0].source, "sky.txt");
                assert!(answer.answer.contains("[sky.txt - chunk 1]"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_evidence_outcome_skips_generation() {
        let h = harness();
        std::fs::write(h.data_dir.join("sky.txt"), "The sky is blue.").unwrap();
        h.service.ingest(None).await.unwrap();

        let outcome = h.service.query("What is the ocean made of?").await.unwrap();
        assert!(matches!(outcome, QueryOutcome::InsufficientEvidence { .. }));
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reingest_replaces_retriever() {
        let h = harness();
        std::fs::write(h.data_dir.join("sky.txt"), "The sky is blue.").unwrap();
        h.service.ingest(None).await.unwrap();
        let before = h.service.retriever();

        let other = h.dir.path().join("other");
        std::fs::create_dir(&other).unwrap();
        std::fs::write(other.join("ocean.md"), "The ocean is deep.").unwrap();
        h.service.ingest(Some(other)).await.unwrap();

        assert!(!Arc::ptr_eq(&before, &h.service.retriever()));
        assert!(matches!(
            h.service.query("Is the ocean deep?").await.unwrap(),
            QueryOutcome::Answered { .. }
        ));
        assert!(matches!(
            h.service.query("Is the sky blue?").await.unwrap(),
            QueryOutcome::InsufficientEvidence { .. }
        ));
    }
}
