//! Vector storage: backend adapters, payload mapping and the memory connector.
//!
//! [`VectorStoreConnector`] is the only type the tool and HTTP layers talk to. It depends on two
//! capabilities injected at construction, an [`crate::embedding::EmbeddingProvider`] and a
//! [`VectorBackend`], so either side can be swapped without touching the other.

pub mod backend;
pub mod connector;
mod http;
pub mod local;
pub mod opensearch;
pub mod payload;
pub mod qdrant;
pub mod types;

pub use backend::{VectorBackend, create_backend};
pub use connector::VectorStoreConnector;
pub use local::LocalBackend;
pub use opensearch::OpenSearchBackend;
pub use payload::entry_from_payload;
pub use qdrant::QdrantBackend;
pub use types::{
    BackendError, ConfigurationError, ConnectorError, Distance, Entry, Metadata, PointInsert,
    ScoredPoint, VectorSchema,
};
