//! Answer generation over retrieved evidence

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::types::{GroundedAnswer, RetrievalResult};

use super::citation::{collect_citations, format_citations};
use super::prompt::PromptBuilder;

/// Generates answers strictly from retrieved chunks
pub struct AnswerGenerator {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerGenerator {
    /// Create a generator over a language model
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// The underlying language model
    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `query` from `results`, appending citations and a confidence note
    ///
    /// Fails with [`Error::EmptyEvidence`] before any model call when
    /// `results` is empty.
    pub async fn generate(&self, query: &str, results: &[RetrievalResult]) -> Result<GroundedAnswer> {
        if results.is_empty() {
            return Err(Error::EmptyEvidence);
        }

        let prompt = PromptBuilder::build_prompt(query, results);
        tracing::debug!(
            "Generating with {} ({} context chunk(s))",
            self.llm.model(),
            results.len()
        );
        let raw = self.llm.generate(&prompt).await?;

        let citations = collect_citations(results);
        let answer = format!(
            "{}\n\nSources: {}\nConfidence: grounded using {} document chunk(s).",
            raw,
            format_citations(&citations),
            results.len()
        );

        Ok(GroundedAnswer { answer, citations })
    }
}
