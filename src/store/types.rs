//! Shared types used by the connector and the vector backends.

use crate::embedding::EmbeddingError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Opaque metadata attached to a memory.
pub type Metadata = Map<String, Value>;

/// A single memory: free text plus optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Text that gets embedded and returned verbatim.
    pub content: String,
    /// Caller-supplied metadata, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Entry {
    /// Build an entry without metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    /// Attach metadata to the entry.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Distance metric configured on a named vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    /// Cosine similarity; the only metric this server provisions.
    Cosine,
    /// Euclidean distance.
    Euclid,
    /// Dot product.
    Dot,
    /// Any other metric reported by a backend.
    Other(String),
}

impl Distance {
    /// Parse the metric names used by Qdrant and OpenSearch.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "cosine" | "cosinesimil" => Self::Cosine,
            "euclid" | "l2" => Self::Euclid,
            "dot" | "innerproduct" => Self::Dot,
            _ => Self::Other(value.to_string()),
        }
    }
}

/// Named vector layout of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSchema {
    /// Name of the vector field; empty for Qdrant's unnamed default vector.
    pub vector_name: String,
    /// Dimensionality of the vectors stored in the field.
    pub size: usize,
    /// Similarity metric used by the field.
    pub distance: Distance,
}

impl VectorSchema {
    /// Cosine schema for the given vector name and size.
    pub fn cosine(vector_name: impl Into<String>, size: usize) -> Self {
        Self {
            vector_name: vector_name.into(),
            size,
            distance: Distance::Cosine,
        }
    }

    pub(crate) fn describe(&self) -> String {
        format!("`{}` ({} dims)", self.vector_name, self.size)
    }
}

/// Point prepared for upsert.
#[derive(Debug, Clone)]
pub struct PointInsert {
    /// Unique point identifier.
    pub id: String,
    /// Named vector the embedding belongs to.
    pub vector_name: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Payload stored alongside the vector.
    pub payload: Map<String, Value>,
}

/// Scored payload returned by similarity queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the point.
    pub id: String,
    /// Similarity score computed by the backend.
    pub score: f32,
    /// Optional payload associated with the point.
    pub payload: Option<Map<String, Value>>,
}

/// Errors returned while talking to a vector backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with an unexpected status code.
    #[error("Unexpected backend response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Backend response did not have the expected shape.
    #[error("Malformed backend response: {0}")]
    InvalidResponse(String),
    /// Backend refused the request (unknown collection, vector layout, name).
    #[error("Backend rejected request: {0}")]
    Rejected(String),
    /// Local store could not read or write its files.
    #[error("Local store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Local store files could not be (de)serialized.
    #[error("Local store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Misconfiguration detected while resolving or provisioning a collection.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Neither the caller nor the configuration named a collection.
    #[error("No collection name provided and no default collection configured")]
    MissingCollection,
    /// Existing collection was provisioned for a different embedding provider.
    #[error(
        "Collection '{collection}' stores {existing}, but the embedding provider produces {provider}"
    )]
    SchemaMismatch {
        /// Collection that failed validation.
        collection: String,
        /// Vector layout found on the collection.
        existing: String,
        /// Vector layout produced by the embedding provider.
        provider: String,
    },
}

/// Errors surfaced by [`crate::store::VectorStoreConnector`].
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Collection could not be resolved or does not match the provider.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Embedding provider failed or returned malformed vectors.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Vector backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Search was asked for zero results.
    #[error("`limit` must be a positive integer")]
    InvalidLimit,
}
