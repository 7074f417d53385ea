//! HTTP client wrapper for interacting with Qdrant.

use crate::store::{
    backend::VectorBackend,
    http::{
        check_collection_name, format_endpoint, normalize_base_url, stringify_point_id,
        unexpected_status,
    },
    types::{BackendError, Distance, PointInsert, ScoredPoint, VectorSchema},
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Characters Qdrant refuses in collection names, plus those that would escape the path segment.
const RESERVED: &[char] = &['/', '\\', '?', '#', '%', '<', '>', ':', '"', '|', '*'];

/// Lightweight REST client for Qdrant collections and points.
pub struct QdrantBackend {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

#[derive(Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    #[serde(default)]
    vectors: Option<Value>,
}

#[derive(Deserialize)]
struct ListCollectionsResponse {
    result: ListCollectionsResult,
}

#[derive(Deserialize)]
struct ListCollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
struct QueryPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl QdrantBackend {
    /// Construct a client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, BackendError> {
        let client = Client::builder().user_agent("vectordb-mcp/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(BackendError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn collection_schema(
        &self,
        collection: &str,
    ) -> Result<Option<Vec<VectorSchema>>, BackendError> {
        check_collection_name(collection, RESERVED)?;
        let response = self
            .request(Method::GET, &format!("collections/{collection}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let info: CollectionInfoResponse = response.json().await?;
                let vectors = info.result.config.params.vectors.unwrap_or(Value::Null);
                Ok(Some(parse_vectors_config(&vectors)))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => {
                let error = unexpected_status(response).await;
                tracing::error!(collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    async fn create_collection(
        &self,
        collection: &str,
        schema: &VectorSchema,
    ) -> Result<(), BackendError> {
        check_collection_name(collection, RESERVED)?;
        let mut vectors = Map::new();
        vectors.insert(
            schema.vector_name.clone(),
            json!({
                "size": schema.size,
                "distance": distance_label(&schema.distance),
            }),
        );

        let response = self
            .request(Method::PUT, &format!("collections/{collection}"))
            .json(&json!({ "vectors": vectors }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(collection, vector_name = %schema.vector_name, "Collection created");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || body.contains("already exists") {
            tracing::debug!(collection, "Collection already exists; treating as created");
            return Ok(());
        }

        let error = BackendError::UnexpectedStatus { status, body };
        tracing::error!(collection, error = %error, "Failed to create collection");
        Err(error)
    }

    async fn upsert_point(
        &self,
        collection: &str,
        point: PointInsert,
    ) -> Result<(), BackendError> {
        check_collection_name(collection, RESERVED)?;
        let PointInsert {
            id,
            vector_name,
            vector,
            payload,
        } = point;

        let mut named_vector = Map::new();
        named_vector.insert(vector_name, json!(vector));

        let response = self
            .request(Method::PUT, &format!("collections/{collection}/points"))
            .query(&[("wait", true)])
            .json(&json!({
                "points": [{
                    "id": id,
                    "vector": named_vector,
                    "payload": payload,
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(collection, error = %error, "Qdrant upsert failed");
            return Err(error);
        }

        tracing::debug!(collection, point_id = %id, "Point upserted");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, BackendError> {
        check_collection_name(collection, RESERVED)?;
        let mut body = Map::new();
        body.insert("query".into(), json!(vector));
        body.insert("limit".into(), Value::from(limit as u64));
        body.insert("with_payload".into(), Value::Bool(true));
        let using = vector_name.trim();
        if !using.is_empty() {
            body.insert("using".into(), Value::String(using.to_string()));
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>, BackendError> {
        let response = self.request(Method::GET, "collections").send().await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(error = %error, "Failed to list collections");
            return Err(error);
        }

        let payload: ListCollectionsResponse = response.json().await?;
        Ok(payload
            .result
            .collections
            .into_iter()
            .map(|collection| collection.name)
            .collect())
    }
}

/// Read Qdrant's `vectors` config, which is either one unnamed vector or a map of named ones.
fn parse_vectors_config(vectors: &Value) -> Vec<VectorSchema> {
    let Some(map) = vectors.as_object() else {
        return Vec::new();
    };

    if let Some(schema) = parse_vector_params("", map) {
        return vec![schema];
    }

    map.iter()
        .filter_map(|(name, params)| parse_vector_params(name, params.as_object()?))
        .collect()
}

fn parse_vector_params(name: &str, params: &Map<String, Value>) -> Option<VectorSchema> {
    let size = params.get("size")?.as_u64()? as usize;
    let distance = params
        .get("distance")
        .and_then(Value::as_str)
        .map(Distance::parse)
        .unwrap_or(Distance::Cosine);
    Some(VectorSchema {
        vector_name: name.to_string(),
        size,
        distance,
    })
}

fn distance_label(distance: &Distance) -> &str {
    match distance {
        Distance::Cosine => "Cosine",
        Distance::Euclid => "Euclid",
        Distance::Dot => "Dot",
        Distance::Other(label) => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn backend(server: &MockServer) -> QdrantBackend {
        QdrantBackend {
            client: Client::builder()
                .user_agent("vectordb-mcp-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: Some("secret".into()),
        }
    }

    #[tokio::test]
    async fn collection_schema_reads_named_vectors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/collections/memories")
                    .header("api-key", "secret");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": {
                        "status": "green",
                        "config": {
                            "params": {
                                "vectors": {
                                    "ollama-nomic-embed-text": { "size": 768, "distance": "Cosine" }
                                }
                            }
                        }
                    }
                }));
            })
            .await;

        let schema = backend(&server)
            .collection_schema("memories")
            .await
            .expect("schema request")
            .expect("collection present");

        assert_eq!(
            schema,
            vec![VectorSchema::cosine("ollama-nomic-embed-text", 768)]
        );
    }

    #[tokio::test]
    async fn collection_schema_reports_missing_collection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/absent");
                then.status(404).json_body(json!({
                    "status": { "error": "Not found: Collection `absent` doesn't exist!" }
                }));
            })
            .await;

        let backend = backend(&server);
        assert!(
            backend
                .collection_schema("absent")
                .await
                .expect("request")
                .is_none()
        );
        assert!(!backend.collection_exists("absent").await.expect("request"));
    }

    #[test]
    fn parse_vectors_config_handles_unnamed_vector() {
        let schema = parse_vectors_config(&json!({ "size": 384, "distance": "Dot" }));
        assert_eq!(
            schema,
            vec![VectorSchema {
                vector_name: String::new(),
                size: 384,
                distance: Distance::Dot,
            }]
        );
    }

    #[tokio::test]
    async fn create_collection_sends_named_cosine_vector() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/memories").json_body(json!({
                    "vectors": {
                        "hash-test": { "size": 4, "distance": "Cosine" }
                    }
                }));
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": true }));
            })
            .await;

        backend(&server)
            .create_collection("memories", &VectorSchema::cosine("hash-test", 4))
            .await
            .expect("create");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_collection_tolerates_existing_collection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/memories");
                then.status(409).json_body(json!({
                    "status": { "error": "Wrong input: Collection `memories` already exists!" }
                }));
            })
            .await;

        backend(&server)
            .create_collection("memories", &VectorSchema::cosine("hash-test", 4))
            .await
            .expect("existing collection is not an error");
    }

    #[tokio::test]
    async fn upsert_point_waits_and_uses_named_vector() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/memories/points")
                    .query_param("wait", "true")
                    .json_body(json!({
                        "points": [{
                            "id": "0b9c9f3e-5d6a-4a4b-9f8e-4a9cf1f0d7a1",
                            "vector": { "hash-test": [0.5, 0.5] },
                            "payload": { "document": "hello", "metadata": null }
                        }]
                    }));
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let mut payload = Map::new();
        payload.insert("document".into(), Value::String("hello".into()));
        payload.insert("metadata".into(), Value::Null);

        backend(&server)
            .upsert_point(
                "memories",
                PointInsert {
                    id: "0b9c9f3e-5d6a-4a4b-9f8e-4a9cf1f0d7a1".into(),
                    vector_name: "hash-test".into(),
                    vector: vec![0.5, 0.5],
                    payload,
                },
            )
            .await
            .expect("upsert");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn query_emits_using_and_parses_points() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/memories/points/query")
                    .json_body(json!({
                        "query": [0.5, 0.25],
                        "limit": 3,
                        "with_payload": true,
                        "using": "hash-test"
                    }));
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "memory-1",
                                "score": 0.42,
                                "payload": { "document": "Example", "metadata": { "tag": "pets" } }
                            },
                            { "id": 7, "score": 0.1 }
                        ]
                    }
                }));
            })
            .await;

        let results = backend(&server)
            .query("memories", "hash-test", vec![0.5, 0.25], 3)
            .await
            .expect("query");

        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "memory-1");
        assert!((results[0].score - 0.42).abs() < f32::EPSILON);
        assert_eq!(results[1].id, "7");
        assert!(results[1].payload.is_none());
    }

    #[tokio::test]
    async fn query_propagates_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/memories/points/query");
                then.status(400)
                    .json_body(json!({ "status": { "error": "Not existing vector name" } }));
            })
            .await;

        let error = backend(&server)
            .query("memories", "wrong", vec![0.1], 1)
            .await
            .expect_err("bad request");

        assert!(matches!(
            error,
            BackendError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn list_collections_returns_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "collections": [{ "name": "memories" }, { "name": "notes" }] }
                }));
            })
            .await;

        let names = backend(&server).list_collections().await.expect("list");
        assert_eq!(names, vec!["memories".to_string(), "notes".to_string()]);
    }

    #[tokio::test]
    async fn path_changing_names_never_reach_the_server() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|_when, then| {
                then.status(200).json_body(json!({ "status": "ok", "result": true }));
            })
            .await;
        let backend = QdrantBackend::new(&server.base_url(), None).expect("backend");

        for name in ["memories/points", "notes?wait=false", "x#y", "..", "a%2Fb", ""] {
            let error = backend
                .collection_schema(name)
                .await
                .expect_err("schema lookup refused");
            assert!(matches!(error, BackendError::Rejected(_)), "{name}: {error}");
            let error = backend
                .query(name, "hash-test", vec![0.5, 0.25], 3)
                .await
                .expect_err("search refused");
            assert!(matches!(error, BackendError::Rejected(_)), "{name}: {error}");
        }

        any.assert_hits_async(0).await;
    }
}
