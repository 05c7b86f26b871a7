//! Retrieval, decision and answer types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::document::Chunk;

/// A retrieved chunk with its distance to the query
///
/// `distance` is a squared L2 distance: lower means more similar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Distance to the query embedding
    pub distance: f32,
}

/// Why the agent did or did not retrieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Nothing to look up
    EmptyQuery,
    /// Greeting, thanks and the like
    SmallTalk,
    /// Needs document evidence
    DocumentGrounded,
}

impl DecisionReason {
    /// Human-readable rationale
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "Empty or whitespace-only query",
            Self::SmallTalk => "Conversational or small-talk query",
            Self::DocumentGrounded => "Document-grounded information request",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a query warrants retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentDecision {
    /// Retrieval should run
    pub require_retrieval: bool,
    /// Rationale
    pub reason: DecisionReason,
}

impl AgentDecision {
    /// Skip retrieval for the given reason
    pub fn skip(reason: DecisionReason) -> Self {
        Self {
            require_retrieval: false,
            reason,
        }
    }

    /// Retrieve document evidence
    pub fn retrieve() -> Self {
        Self {
            require_retrieval: true,
            reason: DecisionReason::DocumentGrounded,
        }
    }
}

/// Citation from a source chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Source file name
    pub source: String,
    /// Origin path
    pub path: String,
    /// Chunk id within the index
    pub chunk_id: u64,
    /// Page number (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Distance to the query
    pub distance: f32,
}

impl Citation {
    /// Create a citation from a retrieval result
    pub fn from_result(result: &RetrievalResult) -> Self {
        let metadata = &result.chunk.metadata;
        Self {
            source: metadata.source.clone(),
            path: metadata.path.clone(),
            chunk_id: metadata.chunk_id,
            page: metadata.page,
            distance: result.distance,
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        format!("[{} - chunk {}]", self.source, self.chunk_id)
    }
}

/// Model output with the citation line and confidence note appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedAnswer {
    /// Final answer text
    pub answer: String,
    /// Citations in retrieval order
    pub citations: Vec<Citation>,
}

/// Result of a query, branched on by callers
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// A grounded answer was generated
    Answered {
        answer: GroundedAnswer,
        reason: DecisionReason,
    },
    /// Retrieval was skipped; the fixed refusal applies
    Refused { reason: DecisionReason },
    /// Retrieval ran but nothing passed the distance threshold
    InsufficientEvidence { reason: DecisionReason },
}

impl QueryOutcome {
    /// Decision reason behind the outcome
    pub fn reason(&self) -> DecisionReason {
        match self {
            Self::Answered { reason, .. }
            | Self::Refused { reason }
            | Self::InsufficientEvidence { reason } => *reason,
        }
    }
}

/// Response for `POST /api/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Answer text or refusal message
    pub answer: String,
    /// Source citations, empty on refusal
    pub citations: Vec<Citation>,
    /// Decision rationale
    pub reason: String,
}

/// Summary of a completed ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Directory the index was published to
    pub index_path: PathBuf,
    /// Documents loaded
    pub documents: usize,
    /// Chunks indexed
    pub chunks: usize,
}
