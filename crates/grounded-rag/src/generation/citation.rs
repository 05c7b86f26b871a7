//! Citation line formatting

use crate::types::{Citation, RetrievalResult};

/// One citation per result, in retrieval order
pub fn collect_citations(results: &[RetrievalResult]) -> Vec<Citation> {
    results.iter().map(Citation::from_result).collect()
}

/// `[source - chunk id]` tokens joined by single spaces
pub fn format_citations(citations: &[Citation]) -> String {
    citations
        .iter()
        .map(Citation::format_inline)
        .collect::<Vec<_>>()
        .join(" ")
}
