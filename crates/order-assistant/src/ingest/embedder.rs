//! Text embedding backends
//!
//! The pipeline only needs `text -> fixed-length vector`; the HTTP client talks
//! to an Ollama server's `/api/embed` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::IngestError;

/// Ollama packaging of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError>;

    /// Identifier recorded in the index artifact.
    fn model_id(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn embed_url(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Requesting {} embedding(s) from {}", texts.len(), self.embed_url());

        let request = EmbedRequest { model: &self.model, input: texts };
        let response = self.http_client
            .post(self.embed_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| IngestError::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Embedding(format!("endpoint returned {}: {}", status, body)));
        }

        let parsed: EmbedResponse = response.json().await
            .map_err(|e| IngestError::Embedding(format!("failed to parse response: {}", e)))?;

        debug!(
            "Received {} embeddings (dim={})",
            parsed.embeddings.len(),
            parsed.embeddings.first().map(|e| e.len()).unwrap_or(0)
        );
        Ok(parsed.embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder_for(server: &mockito::Server) -> OllamaEmbedder {
        OllamaEmbedder::new(server.url(), DEFAULT_EMBEDDING_MODEL, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_embed_parses_vectors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "all-minilm",
                "input": ["uno", "dos"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"all-minilm","embeddings":[[1.0,0.0],[0.0,1.0]]}"#)
            .create_async()
            .await;

        let vectors = embedder_for(&server)
            .embed(&["uno".to_string(), "dos".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embed")
            .with_status(404)
            .with_body("model not found")
            .create_async()
            .await;

        let err = embedder_for(&server).embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, IngestError::Embedding(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "m", Duration::from_secs(1));
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
        assert_eq!(embedder.model_id(), "m");
    }
}
