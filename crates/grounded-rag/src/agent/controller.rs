//! Decides whether a query needs document evidence, and fetches it if so

use std::sync::Arc;

use crate::error::Result;
use crate::retrieval::ChunkRetriever;
use crate::types::{AgentDecision, DecisionReason, RetrievalResult};

/// Conversational phrases answered with a refusal instead of retrieval
pub const SMALL_TALK_PHRASES: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "how are you",
    "who are you",
    "what is your name",
    "thank you",
    "thanks",
    "good morning",
    "good evening",
];

/// Lowercase, drop punctuation, trim
///
/// Word characters (letters, digits, underscore) and whitespace survive.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Guards the retriever against queries that need no evidence
pub struct AgentController {
    retriever: Arc<dyn ChunkRetriever>,
}

impl AgentController {
    /// Create a controller over a retriever
    pub fn new(retriever: Arc<dyn ChunkRetriever>) -> Self {
        Self { retriever }
    }

    fn is_small_talk(query: &str) -> bool {
        let normalized = normalize_query(query);
        SMALL_TALK_PHRASES.contains(&normalized.as_str())
    }

    /// Classify a query; pure, first matching rule wins
    pub fn decide(&self, query: &str) -> AgentDecision {
        if query.trim().is_empty() {
            return AgentDecision::skip(DecisionReason::EmptyQuery);
        }

        if Self::is_small_talk(query) {
            return AgentDecision::skip(DecisionReason::SmallTalk);
        }

        AgentDecision::retrieve()
    }

    /// Decide, then retrieve only when the decision calls for it
    ///
    /// A skipped query never reaches the retriever, so it behaves the same
    /// whether or not an index exists.
    pub async fn retrieve(&self, query: &str) -> Result<(AgentDecision, Vec<RetrievalResult>)> {
        let decision = self.decide(query);
        if !decision.require_retrieval {
            tracing::info!("Skipping retrieval: {}", decision.reason);
            return Ok((decision, Vec::new()));
        }

        let results = self.retriever.retrieve(query).await?;
        Ok((decision, results))
    }
}
