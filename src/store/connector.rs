//! Store and search memories on top of a [`VectorBackend`] and an [`EmbeddingProvider`].

use crate::{
    embedding::{EmbeddingError, EmbeddingProvider},
    store::{
        backend::VectorBackend,
        payload::{build_payload, entry_from_payload},
        types::{ConfigurationError, ConnectorError, Entry, PointInsert, VectorSchema},
    },
};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Connector translating memories into embedded points and back.
///
/// Collections are provisioned lazily on first store, using the provider's vector name and size
/// with cosine distance. Collections already verified by this process are cached so later calls
/// skip the schema round-trip.
pub struct VectorStoreConnector {
    backend: Arc<dyn VectorBackend>,
    embedding: Arc<dyn EmbeddingProvider>,
    default_collection: Option<String>,
    provisioned: RwLock<HashSet<String>>,
    provisioning: Mutex<()>,
}

impl VectorStoreConnector {
    /// Build a connector over the given backend and embedding provider.
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embedding: Arc<dyn EmbeddingProvider>,
        default_collection: Option<String>,
    ) -> Self {
        let default_collection = default_collection
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Self {
            backend,
            embedding,
            default_collection,
            provisioned: RwLock::new(HashSet::new()),
            provisioning: Mutex::new(()),
        }
    }

    /// Collection used when callers do not name one.
    pub fn default_collection(&self) -> Option<&str> {
        self.default_collection.as_deref()
    }

    /// Named vector written and queried by this connector.
    pub fn vector_name(&self) -> &str {
        self.embedding.vector_name()
    }

    /// Dimensionality of the vectors produced by the embedding provider.
    pub fn vector_size(&self) -> usize {
        self.embedding.vector_size()
    }

    /// Resolve the collection a call targets: the argument when non-blank, else the default.
    pub fn resolve_collection(
        &self,
        collection_name: Option<&str>,
    ) -> Result<String, ConfigurationError> {
        collection_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or(self.default_collection.as_deref())
            .map(str::to_string)
            .ok_or(ConfigurationError::MissingCollection)
    }

    /// Names of every collection in the backend.
    pub async fn list_collections(&self) -> Result<Vec<String>, ConnectorError> {
        Ok(self.backend.list_collections().await?)
    }

    /// Make sure `collection` exists and matches the embedding provider.
    pub async fn ensure_collection(&self, collection: &str) -> Result<(), ConnectorError> {
        if self.is_provisioned(collection).await {
            return Ok(());
        }

        let _guard = self.provisioning.lock().await;
        if self.is_provisioned(collection).await {
            return Ok(());
        }

        match self.backend.collection_schema(collection).await? {
            Some(existing) => self.verify_schema(collection, &existing)?,
            None => {
                let schema = self.expected_schema();
                tracing::info!(
                    collection,
                    vector_name = %schema.vector_name,
                    vector_size = schema.size,
                    "Creating collection"
                );
                self.backend.create_collection(collection, &schema).await?;
            }
        }

        self.provisioned
            .write()
            .await
            .insert(collection.to_string());
        Ok(())
    }

    /// Embed and persist one entry, provisioning the collection on first use.
    pub async fn store(
        &self,
        entry: Entry,
        collection_name: Option<&str>,
    ) -> Result<(), ConnectorError> {
        let collection = self.resolve_collection(collection_name)?;
        self.ensure_collection(&collection).await?;

        let vectors = self
            .embedding
            .embed_documents(vec![entry.content.clone()])
            .await?;
        let [vector]: [Vec<f32>; 1] =
            vectors
                .try_into()
                .map_err(|vectors: Vec<Vec<f32>>| EmbeddingError::CountMismatch {
                    expected: 1,
                    actual: vectors.len(),
                })?;
        self.check_dimension(&vector)?;

        let point = PointInsert {
            id: Uuid::new_v4().to_string(),
            vector_name: self.vector_name().to_string(),
            vector,
            payload: build_payload(&entry),
        };
        let point_id = point.id.clone();
        self.backend.upsert_point(&collection, point).await?;

        tracing::info!(
            collection = %collection,
            point_id = %point_id,
            has_metadata = entry.metadata.is_some(),
            "Stored memory"
        );
        Ok(())
    }

    /// Return up to `limit` entries most similar to `query`.
    ///
    /// A collection that does not exist yields an empty result.
    pub async fn search(
        &self,
        query: &str,
        collection_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entry>, ConnectorError> {
        if limit == 0 {
            return Err(ConnectorError::InvalidLimit);
        }
        let collection = self.resolve_collection(collection_name)?;

        if !self.is_provisioned(&collection).await {
            match self.backend.collection_schema(&collection).await? {
                None => {
                    tracing::debug!(collection = %collection, "Search on absent collection");
                    return Ok(Vec::new());
                }
                Some(existing) => {
                    self.verify_schema(&collection, &existing)?;
                    self.provisioned.write().await.insert(collection.clone());
                }
            }
        }

        let vector = self.embedding.embed_query(query).await?;
        self.check_dimension(&vector)?;

        let hits = self
            .backend
            .query(&collection, self.vector_name(), vector, limit)
            .await?;

        let total = hits.len();
        let entries: Vec<Entry> = hits
            .into_iter()
            .filter_map(|hit| {
                let id = hit.id;
                let entry = hit.payload.and_then(entry_from_payload);
                if entry.is_none() {
                    tracing::warn!(collection = %collection, point_id = %id, "Skipping hit without document content");
                }
                entry
            })
            .take(limit)
            .collect();

        tracing::debug!(
            collection = %collection,
            hits = total,
            returned = entries.len(),
            "Search completed"
        );
        Ok(entries)
    }

    async fn is_provisioned(&self, collection: &str) -> bool {
        self.provisioned.read().await.contains(collection)
    }

    fn expected_schema(&self) -> VectorSchema {
        VectorSchema::cosine(self.vector_name(), self.vector_size())
    }

    fn verify_schema(
        &self,
        collection: &str,
        existing: &[VectorSchema],
    ) -> Result<(), ConfigurationError> {
        let expected = self.expected_schema();
        let matches = existing
            .iter()
            .any(|schema| schema.vector_name == expected.vector_name && schema.size == expected.size);
        if matches {
            return Ok(());
        }

        let existing = if existing.is_empty() {
            "no vectors".to_string()
        } else {
            existing
                .iter()
                .map(VectorSchema::describe)
                .collect::<Vec<_>>()
                .join(", ")
        };
        tracing::error!(collection, existing = %existing, "Collection schema does not match embedding provider");
        Err(ConfigurationError::SchemaMismatch {
            collection: collection.to_string(),
            existing,
            provider: expected.describe(),
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        if vector.len() != self.vector_size() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.vector_size(),
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
