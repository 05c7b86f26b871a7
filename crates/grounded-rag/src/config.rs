//! Configuration for the RAG system
//!
//! Defaults are compiled in; an optional TOML file and `RAG_*` environment
//! variables are layered on top with figment. Nested keys use `__` as the
//! separator, e.g. `RAG_RETRIEVAL__MAX_DISTANCE=0.6`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming an optional TOML config file
pub const CONFIG_FILE_ENV: &str = "RAG_CONFIG";

/// Config file read when `RAG_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "rag.toml";

/// Main RAG system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Document and index locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding backend configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Retrieval policy
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load from defaults, the config file and `RAG_*` environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_figment(Self::figment(Path::new(&path)))
    }

    /// Build the layered figment without extracting it
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(RagConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("RAG_").split("__"))
    }

    /// Extract and validate a config from any figment
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: RagConfig = figment
            .extract()
            .map_err(|e| Error::config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be positive"));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(Error::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be positive"));
        }
        if self.embeddings.model.trim().is_empty() {
            return Err(Error::config("embeddings.model must not be empty"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::config("llm.model must not be empty"));
        }
        if self.llm.base_url.trim().is_empty() || self.embeddings.base_url.trim().is_empty() {
            return Err(Error::config("backend base URLs must not be empty"));
        }
        if !self.llm.temperature.is_finite() || self.llm.temperature < 0.0 {
            return Err(Error::config("llm.temperature must be a non-negative number"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be positive"));
        }
        if !self.retrieval.max_distance.is_finite() || self.retrieval.max_distance < 0.0 {
            return Err(Error::config("retrieval.max_distance must be a non-negative number"));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_body_size: 1024 * 1024,
        }
    }
}

/// Where documents are read from and the index is published to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Default directory scanned by ingestion
    pub data_dir: PathBuf,
    /// Directory the index is published to
    pub index_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            index_path: data_dir.join("index"),
            data_dir,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one document
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 120,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Ollama base URL serving the embedding model
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds
    pub read_timeout_secs: u64,
    /// Retries for retryable failures
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            batch_size: 16,
            connect_timeout_secs: 10,
            read_timeout_secs: 120,
            max_retries: 1,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL, with or without the `/api/generate` suffix
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum generated tokens (`num_predict`)
    pub max_tokens: u32,
    /// Connect timeout in seconds, kept short
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds, long enough for a cold model
    pub read_timeout_secs: u64,
    /// Retries for retryable failures
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            connect_timeout_secs: 10,
            read_timeout_secs: 300,
            max_retries: 0,
        }
    }
}

/// Retrieval policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest neighbours requested from the index
    pub top_k: usize,
    /// Inclusive upper bound on accepted squared L2 distance
    pub max_distance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_distance: 0.45,
        }
    }
}
