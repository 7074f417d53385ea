//! Backend capability consumed by the connector, plus the factory selecting an implementation.

use crate::{
    config::{Config, DEFAULT_QDRANT_URL, QDRANT_IN_MEMORY, QdrantSettings, VectorDbProvider},
    store::{
        local::LocalBackend,
        opensearch::OpenSearchBackend,
        qdrant::QdrantBackend,
        types::{BackendError, PointInsert, ScoredPoint, VectorSchema},
    },
};
use async_trait::async_trait;
use std::{path::Path, sync::Arc};

/// Minimal surface of a vector database client.
///
/// Implementations are thin adapters: they never embed text and never decide whether a
/// collection should exist. `create_collection` must treat "already exists" as success.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Vector layout of the collection, or `None` when it does not exist.
    async fn collection_schema(
        &self,
        collection: &str,
    ) -> Result<Option<Vec<VectorSchema>>, BackendError>;

    /// Whether the collection exists.
    async fn collection_exists(&self, collection: &str) -> Result<bool, BackendError> {
        Ok(self.collection_schema(collection).await?.is_some())
    }

    /// Create the collection with a single named vector.
    async fn create_collection(
        &self,
        collection: &str,
        schema: &VectorSchema,
    ) -> Result<(), BackendError>;

    /// Insert or replace one point.
    async fn upsert_point(&self, collection: &str, point: PointInsert)
    -> Result<(), BackendError>;

    /// Top-`limit` similarity query against the named vector, best match first.
    async fn query(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, BackendError>;

    /// Names of every collection in the backend.
    async fn list_collections(&self) -> Result<Vec<String>, BackendError>;
}

/// Build the backend selected by the configuration.
///
/// Qdrant uses the REST client for `QDRANT_URL`, the in-process store for `QDRANT_URL=:memory:`
/// and the on-disk local store for `QDRANT_LOCAL_PATH`. With neither set it connects to
/// `http://localhost:6333`.
pub async fn create_backend(config: &Config) -> Result<Arc<dyn VectorBackend>, BackendError> {
    let backend: Arc<dyn VectorBackend> = match config.provider {
        VectorDbProvider::Qdrant => match qdrant_target(&config.qdrant) {
            QdrantTarget::Remote(url) => {
                Arc::new(QdrantBackend::new(url, config.qdrant.api_key.clone())?)
            }
            QdrantTarget::Disk(path) => Arc::new(LocalBackend::open(path).await?),
            QdrantTarget::InMemory => {
                tracing::warn!("QDRANT_URL=:memory:; memories are lost when the process exits");
                Arc::new(LocalBackend::in_memory())
            }
        },
        VectorDbProvider::OpenSearch => {
            let url = config
                .opensearch
                .url
                .as_deref()
                .ok_or_else(|| BackendError::InvalidUrl("OPENSEARCH_URL is not set".into()))?;
            Arc::new(OpenSearchBackend::new(
                url,
                config.opensearch.username.clone(),
                config.opensearch.password.clone(),
            )?)
        }
    };
    Ok(backend)
}

#[derive(Debug, PartialEq, Eq)]
enum QdrantTarget<'a> {
    Remote(&'a str),
    Disk(&'a Path),
    InMemory,
}

fn qdrant_target(settings: &QdrantSettings) -> QdrantTarget<'_> {
    match (settings.url.as_deref(), settings.local_path.as_deref()) {
        (Some(QDRANT_IN_MEMORY), _) => QdrantTarget::InMemory,
        (Some(url), _) => QdrantTarget::Remote(url),
        (None, Some(path)) => QdrantTarget::Disk(path),
        (None, None) => {
            tracing::info!(url = DEFAULT_QDRANT_URL, "No QDRANT_URL set; using the default");
            QdrantTarget::Remote(DEFAULT_QDRANT_URL)
        }
    }
}
