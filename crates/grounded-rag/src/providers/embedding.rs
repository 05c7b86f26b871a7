//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations must be deterministic for a fixed model: ingesting the
/// same corpus twice has to produce the same vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts in one request
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(Error::invalid_response(
                self.name(),
                format!("returned {} embeddings for 1 text", vectors.len()),
            ));
        }
        vectors
            .pop()
            .ok_or_else(|| Error::invalid_response(self.name(), "no embedding returned"))
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}

/// Embed `texts` in request batches of at most `batch_size`
///
/// Returns exactly one vector per input, in input order.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(Error::config("embedding batch size must be positive"));
    }

    let mut vectors = Vec::with_capacity(texts.len());
    for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
        let embedded = provider.embed_batch(batch).await?;
        if embedded.len() != batch.len() {
            return Err(Error::invalid_response(
                provider.name(),
                format!(
                    "batch {} returned {} embeddings for {} texts",
                    batch_index,
                    embedded.len(),
                    batch.len()
                ),
            ));
        }
        vectors.extend(embedded);
        tracing::debug!("Embedded {}/{} texts", vectors.len(), texts.len());
    }

    Ok(vectors)
}
