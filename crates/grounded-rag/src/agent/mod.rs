//! Retrieval gating for incoming queries

mod controller;

pub use controller::{normalize_query, AgentController, SMALL_TALK_PHRASES};
