//! HTTP server for the RAG system

pub mod routes;
pub mod state;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{Error, Result};
use crate::service::RagService;
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    state: AppState,
}

impl RagServer {
    /// Create a server around an existing service
    pub fn with_service(service: Arc<RagService>) -> Self {
        Self {
            state: AppState::new(service),
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let server = &self.state.config().server;

        let router = Router::new()
            .route("/health", get(health_check))
            .nest("/api", routes::api_routes(server.max_body_size))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        let server = &self.state.config().server;
        format!("{}:{}", server.host, server.port)
    }
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::ingestion::DirectoryLoader;
    use crate::providers::{EmbeddingProvider, LlmProvider};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    /// `[1, 0]` for texts mentioning the sky, `[0, 1]` otherwise
    struct SkyEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SkyEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("sky") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }

        fn name(&self) -> &str {
            "sky"
        }

        fn model(&self) -> &str {
            "sky-v1"
        }
    }

    struct FixedLlm;

    #[async_trait]
    impl LlmProvider for FixedLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("It is blue.".to_string())
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-v1"
        }
    }

    fn test_server(root: &std::path::Path) -> RagServer {
        let mut config = RagConfig::default();
        config.storage.data_dir = root.join("data");
        config.storage.index_path = root.join("index");

        let service = RagService::new(
            Arc::new(config),
            Arc::new(SkyEmbedder),
            Arc::new(FixedLlm),
            Arc::new(DirectoryLoader::new()),
        )
        .unwrap();
        RagServer::with_service(Arc::new(service))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_server(dir.path())
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_info_reports_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_server(dir.path())
            .router()
            .oneshot(Request::builder().uri("/api/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "grounded-rag");
        assert_eq!(body["index_ready"], false);
        assert_eq!(body["retrieval"]["top_k"], 4);
    }

    #[tokio::test]
    async fn test_small_talk_gets_refusal() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_server(dir.path())
            .router()
            .oneshot(post_json("/api/query", json!({"query": "hello"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["answer"],
            "I can only answer grounded questions based on the ingested documents."
        );
        assert_eq!(body["citations"], json!([]));
        assert_eq!(body["reason"], "Conversational or small-talk query");
    }

    #[tokio::test]
    async fn test_query_before_ingest_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_server(dir.path())
            .router()
            .oneshot(post_json("/api/query", json!({"query": "What color is the sky?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "index_not_found");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Run ingestion first"));
    }

    #[tokio::test]
    async fn test_ingest_empty_directory_is_unprocessable() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_server(dir.path())
            .router()
            .oneshot(post_json("/api/ingest", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["type"], "no_documents");
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        std::fs::write(docs.join("sky.txt"), "The sky is blue.").unwrap();

        let server = test_server(dir.path());

        let response = server
            .router()
            .oneshot(post_json(
                "/api/ingest",
                json!({"data_dir": docs.to_string_lossy()}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = body_json(response).await;
        assert_eq!(report["documents"], 1);
        assert_eq!(report["chunks"], 1);

        let response = server
            .router()
            .oneshot(post_json("/api/query", json!({"query": "What color is the sky?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["answer"]
            .as_str()
            .unwrap()
            .contains("Sources: [sky.txt - chunk 0]"));
        assert_eq!(body["citations"][0]["source"], "sky.txt");
        assert_eq!(body["citations"][0]["chunk_id"], 0);
        assert_eq!(body["reason"], "Document-grounded information request");

        let response = server
            .router()
            .oneshot(post_json("/api/query", json!({"query": "What about grass?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "No supporting evidence found for this query. Ingest documents or refine the question."
        );
    }
}
