//! Grounded answer generation with citations

pub mod citation;
mod generator;
pub mod prompt;

pub use citation::{collect_citations, format_citations};
pub use generator::AnswerGenerator;
pub use prompt::{PromptBuilder, SYSTEM_PROMPT};
