//! Embedding provider abstraction and adapters.
//!
//! Providers turn text into fixed-size vectors and advertise the named vector they populate.
//! The connector provisions collections from `vector_name`/`vector_size`, so both must stay stable
//! for the lifetime of a provider. Concrete providers are picked by [`create_embedding_provider`].

#[cfg(feature = "fastembed")]
mod fastembed;
mod hash;
mod ollama;
mod openai;

#[cfg(feature = "fastembed")]
pub use fastembed::FastEmbedProvider;
pub use hash::HashEmbeddingProvider;
pub use ollama::OllamaEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

use crate::config::{EmbeddingProviderKind, EmbeddingSettings};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP layer failed before a response was received.
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Provider answered with a non-success status code.
    #[error("Embedding provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Number of vectors differs from the number of inputs.
    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// A vector does not have the declared dimensionality.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Declared vector size of the provider.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
    /// In-process model failed while embedding.
    #[error("Local embedding model failed: {0}")]
    Local(String),
    /// Provider could not be constructed from the supplied settings.
    #[error("Invalid embedding settings: {0}")]
    InvalidSettings(String),
}

/// Capability implemented by embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of documents, returning one vector per input in the same order.
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_documents(vec![text.to_string()]).await?;
        let actual = vectors.len();
        match vectors.pop() {
            Some(vector) if actual == 1 => Ok(vector),
            _ => Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual,
            }),
        }
    }

    /// Name of the vector field this provider populates.
    fn vector_name(&self) -> &str;

    /// Dimensionality of every vector this provider produces.
    fn vector_size(&self) -> usize;
}

/// Build the embedding provider selected by the settings.
pub fn create_embedding_provider(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    if settings.dimension == 0 {
        return Err(EmbeddingError::InvalidSettings(
            "embedding dimension must be greater than zero".into(),
        ));
    }

    let vector_name = settings
        .vector_name
        .clone()
        .unwrap_or_else(|| derive_vector_name(settings.provider, &settings.model));

    tracing::info!(
        provider = settings.provider.label(),
        model = %settings.model,
        dimension = settings.dimension,
        vector_name = %vector_name,
        "Initializing embedding provider"
    );

    let provider: Arc<dyn EmbeddingProvider> = match settings.provider {
        #[cfg(feature = "fastembed")]
        EmbeddingProviderKind::FastEmbed => Arc::new(FastEmbedProvider::new(
            &settings.model,
            vector_name,
            settings.dimension,
        )?),
        #[cfg(not(feature = "fastembed"))]
        EmbeddingProviderKind::FastEmbed => {
            return Err(EmbeddingError::InvalidSettings(
                "EMBEDDING_PROVIDER=fastembed requires building with the `fastembed` feature".into(),
            ));
        }
        EmbeddingProviderKind::Hash => {
            Arc::new(HashEmbeddingProvider::new(vector_name, settings.dimension))
        }
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbeddingProvider::new(
            &settings.ollama_url,
            settings.model.clone(),
            vector_name,
            settings.dimension,
        )?),
        EmbeddingProviderKind::OpenAI => {
            let api_key = settings.openai_api_key.clone().ok_or_else(|| {
                EmbeddingError::InvalidSettings("OPENAI_API_KEY is required".into())
            })?;
            Arc::new(OpenAiEmbeddingProvider::new(
                &settings.openai_base_url,
                api_key,
                settings.model.clone(),
                vector_name,
                settings.dimension,
            )?)
        }
    };

    Ok(provider)
}

/// Derive a stable vector name such as `ollama-nomic-embed-text` or `fast-all-minilm-l6-v2`.
pub fn derive_vector_name(provider: EmbeddingProviderKind, model: &str) -> String {
    let short = model.rsplit('/').next().unwrap_or(model).to_lowercase();
    let slug: String = short
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        provider.vector_prefix().to_string()
    } else {
        format!("{}-{slug}", provider.vector_prefix())
    }
}

/// Check that a provider returned exactly one vector of the declared size per input.
pub(crate) fn validate_embeddings(
    expected_count: usize,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::CountMismatch {
            expected: expected_count,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

/// Join a base URL and a relative path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Turn a non-success response into an [`EmbeddingError::UnexpectedStatus`].
pub(crate) async fn status_error(response: reqwest::Response) -> EmbeddingError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = EmbeddingError::UnexpectedStatus { status, body };
    tracing::error!(error = %error, "Embedding request failed");
    error
}
