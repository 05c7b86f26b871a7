//! Ollama HTTP client and the embedding/LLM providers built on it

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

const BACKEND: &str = "ollama";
const GENERATE_PATH: &str = "/api/generate";

/// Ollama API client with bounded waits and retry of transient failures
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash or endpoint path
    base_url: String,
    /// Read budget, reported in timeout errors
    read_timeout: Duration,
    /// Maximum retries
    max_retries: u32,
}

impl OllamaClient {
    /// Create a client with separate connect and read budgets
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: Self::normalize_base_url(base_url),
            read_timeout,
            max_retries,
        })
    }

    /// Create a client for the generation backend
    pub fn for_llm(config: &LlmConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.read_timeout_secs),
            config.max_retries,
        )
    }

    /// Create a client for the embedding backend
    pub fn for_embeddings(config: &EmbeddingConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.read_timeout_secs),
            config.max_retries,
        )
    }

    /// Accept either a base URL or one already pointing at `/api/generate`
    pub fn normalize_base_url(url: &str) -> String {
        let trimmed = url.trim().trim_end_matches('/');
        trimmed
            .strip_suffix(GENERATE_PATH)
            .unwrap_or(trimmed)
            .to_string()
    }

    /// Full URL for an API path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Retry a request with exponential backoff, only for retryable errors
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// POST a JSON body and decode the JSON reply
    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let url = url.as_str();

        self.retry_request(|| async move {
            let response = self
                .client
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| self.map_transport_error(e))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(status_error(status, url, &detail));
            }

            response.json::<Resp>().await.map_err(|e| {
                if e.is_timeout() {
                    self.map_transport_error(e)
                } else {
                    Error::invalid_response(BACKEND, format!("Failed to parse response: {}", e))
                }
            })
        })
        .await
    }

    fn map_transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            tracing::error!(
                "Ollama timed out after {}s (model may be cold)",
                self.read_timeout.as_secs()
            );
            Error::timeout(
                BACKEND,
                format!(
                    "timed out after {}s. Try warming the model or reducing context size.",
                    self.read_timeout.as_secs()
                ),
            )
        } else {
            tracing::error!("Ollama request failed: {}", e);
            Error::communication(BACKEND, e.to_string())
        }
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = self.endpoint("/api/tags");

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// Map a non-success status to an error
///
/// Client errors other than 408 and 429 will fail again unchanged, so they
/// are not retryable.
fn status_error(status: StatusCode, url: &str, detail: &str) -> Error {
    let message = format!("HTTP {} from {} - {}", status, url, detail);
    let transient = status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS;
    if status.is_client_error() && !transient {
        tracing::error!("Ollama rejected the request: {}", message);
        Error::invalid_response(BACKEND, message)
    } else {
        Error::communication(BACKEND, message)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Pull the generated text out of a `/api/generate` reply
fn extract_generated_text(payload: &Value) -> Result<String> {
    match payload.get("response").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => {
            tracing::error!("Invalid Ollama response payload: {}", payload);
            Err(Error::invalid_response(
                BACKEND,
                "empty or missing 'response' field",
            ))
        }
    }
}

/// Ollama embedding provider
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Arc::new(OllamaClient::for_embeddings(config)?);
        Ok(Self::from_client(client, config.model.clone()))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbedResponse = self.client.post_json("/api/embed", &request).await?;
        Ok(response.embeddings)
    }

    fn name(&self) -> &str {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Arc::new(OllamaClient::for_llm(config)?);
        tracing::info!(
            "Initialized Ollama LLM | model={} | endpoint={}",
            config.model,
            client.endpoint(GENERATE_PATH)
        );
        Ok(Self::from_client(client, config))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::internal("Prompt must be a non-empty string"));
        }

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        tracing::info!("Sending prompt to Ollama (len={} chars)", prompt.chars().count());

        let payload: Value = self.client.post_json(GENERATE_PATH, &request).await?;
        extract_generated_text(&payload)
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.model
    }
}
