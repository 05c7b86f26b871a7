//! Shared application state for the HTTP server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::service::RagService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<RagService>,
}

impl AppState {
    /// Wrap an existing service
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }

    /// The RAG service
    pub fn service(&self) -> &RagService {
        &self.service
    }

    /// Active configuration
    pub fn config(&self) -> &RagConfig {
        self.service.config()
    }
}
