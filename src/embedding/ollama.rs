use super::{EmbeddingError, EmbeddingProvider, endpoint, status_error, validate_embeddings};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Embedding provider backed by a local Ollama runtime (`POST /api/embed`).
pub struct OllamaEmbeddingProvider {
    http: Client,
    base_url: String,
    model: String,
    vector_name: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingProvider {
    /// Construct a client targeting `base_url` for the given model.
    pub fn new(
        base_url: &str,
        model: String,
        vector_name: String,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        let http = Client::builder().user_agent("vectordb-mcp/embed").build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            vector_name,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let count = texts.len();
        tracing::debug!(model = %self.model, count, "Requesting Ollama embeddings");

        let response = self
            .http
            .post(endpoint(&self.base_url, "api/embed"))
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: EmbedResponse = response.json().await.map_err(|error| {
            EmbeddingError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        validate_embeddings(count, self.dimension, body.embeddings)
    }

    fn vector_name(&self) -> &str {
        &self.vector_name
    }

    fn vector_size(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn provider(base_url: &str, dimension: usize) -> OllamaEmbeddingProvider {
        OllamaEmbeddingProvider::new(
            base_url,
            "nomic-embed-text".into(),
            "ollama-nomic-embed-text".into(),
            dimension,
        )
        .expect("provider")
    }

    #[tokio::test]
    async fn embeds_batch_in_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body(json!({
                        "model": "nomic-embed-text",
                        "input": ["first", "second"]
                    }));
                then.status(200).json_body(json!({
                    "model": "nomic-embed-text",
                    "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
                }));
            })
            .await;

        let vectors = provider(&server.base_url(), 3)
            .embed_documents(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.4).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200)
                    .json_body(json!({ "embeddings": [[0.1, 0.2]] }));
            })
            .await;

        let error = provider(&server.base_url(), 3)
            .embed_query("hello")
            .await
            .expect_err("dimension mismatch");

        assert!(matches!(
            error,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(404).body("model not found");
            })
            .await;

        let error = provider(&server.base_url(), 3)
            .embed_query("hello")
            .await
            .expect_err("error status");

        match error {
            EmbeddingError::UnexpectedStatus { status, body } => {
                assert_eq!(status.as_u16(), 404);
                assert!(body.contains("model not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_skips_network() {
        let vectors = provider("http://127.0.0.1:9", 3)
            .embed_documents(Vec::new())
            .await
            .expect("empty batch");
        assert!(vectors.is_empty());
    }
}
