//! Provider abstractions for embeddings and LLM generation
//!
//! The pipeline only sees these traits; the Ollama implementations are the
//! default backends.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::{embed_in_batches, EmbeddingProvider};
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
