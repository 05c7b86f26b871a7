//! Prompt templates for grounded generation

use crate::types::RetrievalResult;

/// Fixed instruction restricting the model to the supplied context
pub const SYSTEM_PROMPT: &str = "You are a domain-specific assistant.\n\
Answer the question using ONLY the provided context.\n\
If the context does not contain enough information, say so explicitly.\n\
Do NOT use prior knowledge.\n\
Cite sources inline using square brackets.\n";

/// Prompt builder for grounded queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// One labeled block per result, 1-based, separated by blank lines
    pub fn build_context(results: &[RetrievalResult]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                format!(
                    "[Source {}: {}, chunk {}]\n{}",
                    i + 1,
                    result.chunk.source(),
                    result.chunk.chunk_id(),
                    result.chunk.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Full prompt: instruction, context blocks, question
    ///
    /// Context is passed through untruncated.
    pub fn build_prompt(question: &str, results: &[RetrievalResult]) -> String {
        format!(
            "{}\nContext:\n{}\n\nQuestion: {}\nAnswer:",
            SYSTEM_PROMPT,
            Self::build_context(results),
            question
        )
    }
}
