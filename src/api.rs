//! HTTP surface for the memory server.
//!
//! A compact Axum router mirroring the MCP tools for hosts that prefer plain HTTP:
//!
//! - `POST /memories` – Embed and store one memory (`information`, optional `metadata` and
//!   `collection_name`).
//! - `POST /search` – Return the memories closest to `query` (optional `collection_name`,
//!   `limit`).
//! - `GET /collections` – List collections in the vector database.
//! - `GET /health` – Report the named vector and size this server writes.
//!
//! The router is generic over [`MemoryApi`] so it can be exercised without a live backend.

use crate::store::{ConfigurationError, ConnectorError, Entry, Metadata, VectorStoreConnector};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Operations the HTTP surface needs from the memory layer.
#[async_trait]
pub trait MemoryApi: Send + Sync {
    /// Store `entry` and return the collection it landed in.
    async fn store_memory(
        &self,
        entry: Entry,
        collection_name: Option<&str>,
    ) -> Result<String, ConnectorError>;

    /// Similarity search over a collection.
    async fn search_memories(
        &self,
        query: &str,
        collection_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entry>, ConnectorError>;

    /// Names of every collection.
    async fn list_collections(&self) -> Result<Vec<String>, ConnectorError>;

    /// Named vector written by the server.
    fn vector_name(&self) -> &str;

    /// Dimensionality of the stored vectors.
    fn vector_size(&self) -> usize;
}

#[async_trait]
impl MemoryApi for VectorStoreConnector {
    async fn store_memory(
        &self,
        entry: Entry,
        collection_name: Option<&str>,
    ) -> Result<String, ConnectorError> {
        let collection = self.resolve_collection(collection_name)?;
        self.store(entry, Some(&collection)).await?;
        Ok(collection)
    }

    async fn search_memories(
        &self,
        query: &str,
        collection_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entry>, ConnectorError> {
        self.search(query, collection_name, limit).await
    }

    async fn list_collections(&self) -> Result<Vec<String>, ConnectorError> {
        VectorStoreConnector::list_collections(self).await
    }

    fn vector_name(&self) -> &str {
        VectorStoreConnector::vector_name(self)
    }

    fn vector_size(&self) -> usize {
        VectorStoreConnector::vector_size(self)
    }
}

struct ApiState<S> {
    service: Arc<S>,
    default_limit: usize,
}

/// Build the HTTP router; `default_limit` applies to searches that omit `limit`.
pub fn create_router<S>(service: Arc<S>, default_limit: usize) -> Router
where
    S: MemoryApi + 'static,
{
    Router::new()
        .route("/memories", post(store_memory::<S>))
        .route("/search", post(search_memories::<S>))
        .route("/collections", get(list_collections::<S>))
        .route("/health", get(health::<S>))
        .with_state(Arc::new(ApiState {
            service,
            default_limit,
        }))
}

/// Request body for `POST /memories`.
#[derive(Deserialize)]
struct StoreRequest {
    information: String,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    collection_name: Option<String>,
}

#[derive(Serialize)]
struct StoreResponse {
    status: &'static str,
    collection: String,
}

async fn store_memory<S>(
    State(state): State<Arc<ApiState<S>>>,
    Json(request): Json<StoreRequest>,
) -> Result<Json<StoreResponse>, AppError>
where
    S: MemoryApi,
{
    if request.information.trim().is_empty() {
        return Err(AppError::BadRequest("`information` must not be empty".into()));
    }
    let mut entry = Entry::new(request.information);
    if let Some(metadata) = request.metadata {
        entry = entry.with_metadata(metadata);
    }
    let collection = state
        .service
        .store_memory(entry, request.collection_name.as_deref())
        .await?;
    tracing::info!(collection = %collection, "Store request completed");
    Ok(Json(StoreResponse {
        status: "ok",
        collection,
    }))
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    collection_name: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<Entry>,
}

async fn search_memories<S>(
    State(state): State<Arc<ApiState<S>>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: MemoryApi,
{
    if request.query.trim().is_empty() {
        return Err(AppError::BadRequest("`query` must not be empty".into()));
    }
    let limit = request.limit.unwrap_or(state.default_limit);
    let results = state
        .service
        .search_memories(&request.query, request.collection_name.as_deref(), limit)
        .await?;
    Ok(Json(SearchResponse { results }))
}

#[derive(Serialize)]
struct CollectionsResponse {
    collections: Vec<String>,
}

async fn list_collections<S>(
    State(state): State<Arc<ApiState<S>>>,
) -> Result<Json<CollectionsResponse>, AppError>
where
    S: MemoryApi,
{
    let collections = state.service.list_collections().await?;
    Ok(Json(CollectionsResponse { collections }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    vector_name: String,
    vector_size: usize,
}

async fn health<S>(State(state): State<Arc<ApiState<S>>>) -> Json<HealthResponse>
where
    S: MemoryApi,
{
    Json(HealthResponse {
        status: "ok",
        vector_name: state.service.vector_name().to_string(),
        vector_size: state.service.vector_size(),
    })
}

enum AppError {
    BadRequest(String),
    Connector(ConnectorError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Connector(
                error @ (ConnectorError::InvalidLimit
                | ConnectorError::Configuration(ConfigurationError::MissingCollection)),
            ) => (StatusCode::BAD_REQUEST, error.to_string()),
            Self::Connector(error) => {
                tracing::error!(error = %error, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ConnectorError> for AppError {
    fn from(inner: ConnectorError) -> Self {
        Self::Connector(inner)
    }
}
