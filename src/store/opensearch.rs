//! OpenSearch k-NN backend.
//!
//! Each collection maps to one index whose mapping holds a `knn_vector` field named after the
//! embedding provider's vector. Documents keep the connector payload (`document`, `metadata`) in
//! `_source` next to the vector. Amazon OpenSearch Serverless endpoints are reached through a
//! signing proxy; they reject `refresh`, so it is skipped for `*.aoss.amazonaws.com` hosts.

use crate::store::{
    backend::VectorBackend,
    http::{check_collection_name, format_endpoint, normalize_base_url, unexpected_status},
    types::{BackendError, Distance, PointInsert, ScoredPoint, VectorSchema},
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Characters OpenSearch refuses in index names; `,` and `*` would also fan out to several indexes.
const RESERVED: &[char] = &[
    '/', '\\', '?', '#', '%', '<', '>', ':', '"', '|', '*', ',', ' ',
];

/// REST client for OpenSearch indexes.
pub struct OpenSearchBackend {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) credentials: Option<(String, Option<String>)>,
    pub(crate) refresh: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f32>,
    #[serde(rename = "_source", default)]
    source: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct CatIndex {
    index: String,
}

impl OpenSearchBackend {
    /// Construct a client for the OpenSearch endpoint at `url`.
    pub fn new(
        url: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder().user_agent("vectordb-mcp/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(BackendError::InvalidUrl)?;
        let refresh = !base_url.contains(".aoss.amazonaws.com");
        tracing::debug!(
            url = %base_url,
            has_credentials = username.is_some(),
            refresh,
            "Initialized OpenSearch HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            credentials: username.map(|user| (user, password)),
            refresh,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let req = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => req.basic_auth(user, password.as_ref()),
            None => req,
        }
    }
}

#[async_trait]
impl VectorBackend for OpenSearchBackend {
    async fn collection_schema(
        &self,
        collection: &str,
    ) -> Result<Option<Vec<VectorSchema>>, BackendError> {
        check_index_name(collection)?;
        let response = self
            .request(Method::GET, &format!("{collection}/_mapping"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: Map<String, Value> = response.json().await?;
                Ok(Some(parse_knn_fields(&body)))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => {
                let error = unexpected_status(response).await;
                tracing::error!(collection, error = %error, "Index mapping lookup failed");
                Err(error)
            }
        }
    }

    async fn create_collection(
        &self,
        collection: &str,
        schema: &VectorSchema,
    ) -> Result<(), BackendError> {
        check_index_name(collection)?;
        let mut properties = Map::new();
        properties.insert(
            schema.vector_name.clone(),
            json!({
                "type": "knn_vector",
                "dimension": schema.size,
                "method": {
                    "name": "hnsw",
                    "engine": "lucene",
                    "space_type": space_type(&schema.distance),
                }
            }),
        );
        properties.insert("document".into(), json!({ "type": "text" }));
        properties.insert(
            "metadata".into(),
            json!({ "type": "object", "enabled": false }),
        );

        let response = self
            .request(Method::PUT, collection)
            .json(&json!({
                "settings": { "index": { "knn": true } },
                "mappings": { "properties": properties }
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(collection, vector_name = %schema.vector_name, "Index created");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if body.contains("resource_already_exists_exception") {
            tracing::debug!(collection, "Index already exists; treating as created");
            return Ok(());
        }

        let error = BackendError::UnexpectedStatus { status, body };
        tracing::error!(collection, error = %error, "Failed to create index");
        Err(error)
    }

    async fn upsert_point(
        &self,
        collection: &str,
        point: PointInsert,
    ) -> Result<(), BackendError> {
        check_index_name(collection)?;
        let PointInsert {
            id,
            vector_name,
            vector,
            mut payload,
        } = point;
        payload.insert(vector_name, json!(vector));

        let mut req = self.request(Method::PUT, &format!("{collection}/_doc/{id}"));
        if self.refresh {
            req = req.query(&[("refresh", "true")]);
        }
        let response = req.json(&payload).send().await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(collection, error = %error, "OpenSearch upsert failed");
            return Err(error);
        }

        tracing::debug!(collection, point_id = %id, "Document indexed");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, BackendError> {
        check_index_name(collection)?;
        let mut knn = Map::new();
        knn.insert(
            vector_name.to_string(),
            json!({ "vector": vector, "k": limit }),
        );

        let response = self
            .request(Method::POST, &format!("{collection}/_search"))
            .json(&json!({
                "size": limit,
                "_source": { "excludes": [vector_name] },
                "query": { "knn": knn }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(collection, error = %error, "OpenSearch search failed");
            return Err(error);
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .hits
            .hits
            .into_iter()
            .map(|hit| ScoredPoint {
                id: hit.id,
                score: hit.score.unwrap_or_default(),
                payload: hit.source,
            })
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .request(Method::GET, "_cat/indices")
            .query(&[("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(error = %error, "Failed to list indexes");
            return Err(error);
        }

        let indices: Vec<CatIndex> = response.json().await?;
        let mut names: Vec<String> = indices
            .into_iter()
            .map(|entry| entry.index)
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Index names must address exactly one index; `_all`, `-x` and `+x` are expressions.
fn check_index_name(name: &str) -> Result<(), BackendError> {
    check_collection_name(name, RESERVED)?;
    if name.starts_with(['_', '-', '+']) {
        return Err(BackendError::Rejected(format!(
            "invalid index name `{name}`"
        )));
    }
    Ok(())
}

/// Collect every `knn_vector` field from a `GET /{index}/_mapping` response.
fn parse_knn_fields(body: &Map<String, Value>) -> Vec<VectorSchema> {
    body.values()
        .filter_map(|index| index.pointer("/mappings/properties")?.as_object())
        .flat_map(|properties| properties.iter())
        .filter(|(_, field)| field.get("type").and_then(Value::as_str) == Some("knn_vector"))
        .filter_map(|(name, field)| {
            let size = field.get("dimension")?.as_u64()? as usize;
            let distance = field
                .pointer("/method/space_type")
                .and_then(Value::as_str)
                .map(Distance::parse)
                .unwrap_or(Distance::Euclid);
            Some(VectorSchema {
                vector_name: name.clone(),
                size,
                distance,
            })
        })
        .collect()
}

fn space_type(distance: &Distance) -> &str {
    match distance {
        Distance::Cosine => "cosinesimil",
        Distance::Euclid => "l2",
        Distance::Dot => "innerproduct",
        Distance::Other(label) => label,
    }
}
