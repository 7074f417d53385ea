use super::{EmbeddingError, EmbeddingProvider, endpoint, status_error, validate_embeddings};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Embedding provider for the OpenAI `/embeddings` API and compatible gateways.
pub struct OpenAiEmbeddingProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    vector_name: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingProvider {
    /// Construct a client for `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        vector_name: String,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        let http = Client::builder().user_agent("vectordb-mcp/embed").build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            vector_name,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let count = texts.len();
        tracing::debug!(model = %self.model, count, "Requesting OpenAI embeddings");

        let response = self
            .http
            .post(endpoint(&self.base_url, "embeddings"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let mut body: EmbeddingsResponse = response.json().await.map_err(|error| {
            EmbeddingError::InvalidResponse(format!("failed to decode OpenAI response: {error}"))
        })?;
        body.data.sort_by_key(|datum| datum.index);
        let vectors = body.data.into_iter().map(|datum| datum.embedding).collect();

        validate_embeddings(count, self.dimension, vectors)
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

    #[tokio::test]
    async fn restores_input_order_and_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [
                        { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                        { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let provider = OpenAiEmbeddingProvider::new(
            &format!("{}/v1", server.base_url()),
            "sk-test".into(),
            "text-embedding-3-small".into(),
            "openai-text-embedding-3-small".into(),
            2,
        )
        .expect("provider");

        let vectors = provider
            .embed_documents(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn missing_vectors_are_a_count_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;

        let provider = OpenAiEmbeddingProvider::new(
            &server.base_url(),
            "sk-test".into(),
            "text-embedding-3-small".into(),
            "openai".into(),
            2,
        )
        .expect("provider");

        let error = provider.embed_query("hello").await.expect_err("mismatch");
        assert!(matches!(
            error,
            EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0
            }
        ));
    }
}
