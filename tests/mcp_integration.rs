use std::{collections::HashMap, sync::Arc};

use httpmock::{
    Method::{GET, POST, PUT},
    MockServer,
};
use rmcp::{
    handler::client::ClientHandler,
    model::{self, CallToolRequestParam, CallToolResult, ClientInfo, PaginatedRequestParam},
    service::{RoleClient, RoleServer, RunningService, ServiceError, serve_directly},
    transport::async_rw::AsyncRwTransport,
};
use serde_json::{Value, json};
use tokio::io::split;
use vectordb_mcp::{
    config::Config,
    embedding::HashEmbeddingProvider,
    logging,
    mcp::VectorDbMcpServer,
    store::{LocalBackend, QdrantBackend, VectorBackend, VectorStoreConnector},
};

#[derive(Clone, Default)]
struct DummyClientHandler;

impl ClientHandler for DummyClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

struct TestHarness {
    service: RunningService<RoleClient, DummyClientHandler>,
    server: RunningService<RoleServer, VectorDbMcpServer>,
}

impl TestHarness {
    async fn new(backend: Arc<dyn VectorBackend>, env: &[(&str, &str)]) -> Self {
        logging::init_tracing(None);

        let vars: HashMap<String, String> = env
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("test config");

        let connector = Arc::new(VectorStoreConnector::new(
            backend,
            Arc::new(HashEmbeddingProvider::new("hash-test", 16)),
            config.collection_name.clone(),
        ));
        let server = VectorDbMcpServer::new(connector, config.tools.clone(), config.tool_prefix());

        let (client_stream, server_stream) = tokio::io::duplex(16 * 1024);
        let (client_read, client_write) = split(client_stream);
        let (server_read, server_write) = split(server_stream);

        let client_transport = AsyncRwTransport::new_client(client_read, client_write);
        let server_transport = AsyncRwTransport::new_server(server_read, server_write);

        let server_info = rmcp::handler::server::ServerHandler::get_info(&server);
        let client_handler = DummyClientHandler;
        let client_info = ClientHandler::get_info(&client_handler);

        let server =
            serve_directly::<RoleServer, _, _, _, _>(server, server_transport, Some(client_info));
        let service = serve_directly::<RoleClient, _, _, _, _>(
            client_handler,
            client_transport,
            Some(server_info),
        );

        Self { service, server }
    }

    async fn local(env: &[(&str, &str)]) -> Self {
        Self::new(Arc::new(LocalBackend::in_memory()), env).await
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult, ServiceError> {
        self.service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
            })
            .await
    }

    async fn shutdown(self) {
        let Self { service, server } = self;
        let _ = service.cancel().await;
        let _ = server.cancel().await;
    }
}

fn texts(result: &CallToolResult) -> Vec<String> {
    result
        .content
        .iter()
        .map(|content| content.as_text().expect("text content").text.clone())
        .collect()
}

fn assert_invalid_params(error: ServiceError) {
    match error {
        ServiceError::McpError(data) => {
            assert_eq!(data.code, model::ErrorCode::INVALID_PARAMS);
        }
        other => panic!("expected MCP error, got {other:?}"),
    }
}

#[tokio::test]
async fn initialize_and_list_tools() {
    let harness = TestHarness::local(&[("COLLECTION_NAME", "memories")]).await;
    let service = &harness.service;

    let info = service
        .peer_info()
        .expect("server info should be initialized");
    assert_eq!(info.server_info.name, "vectordb-mcp");
    assert!(info.capabilities.tools.is_some());

    let tools_result = service
        .list_tools(Some(PaginatedRequestParam { cursor: None }))
        .await
        .expect("list_tools");

    let mut names: Vec<_> = tools_result
        .tools
        .iter()
        .map(|tool| tool.name.as_ref())
        .collect();
    names.sort();
    assert_eq!(names, vec!["qdrant-find", "qdrant-store"]);

    harness.shutdown().await;
}

#[tokio::test]
async fn store_then_find_round_trip() {
    let harness = TestHarness::local(&[("COLLECTION_NAME", "memories")]).await;

    let stored = harness
        .call(
            "qdrant-store",
            json!({ "information": "cats are great", "metadata": { "tag": "pets" } }),
        )
        .await
        .expect("store tool call");
    assert_eq!(stored.is_error, Some(false));
    assert_eq!(
        texts(&stored),
        vec!["Stored: cats are great in collection memories".to_string()]
    );

    harness
        .call("qdrant-store", json!({ "information": "the deploy runs on fridays" }))
        .await
        .expect("second store");

    let found = harness
        .call("qdrant-find", json!({ "query": "cats", "limit": 5 }))
        .await
        .expect("find tool call");
    let found_texts = texts(&found);
    assert_eq!(found_texts[0], "Results for the query: 'cats'");
    assert_eq!(
        found_texts[1],
        "<entry><content>cats are great</content><metadata>{\"tag\":\"pets\"}</metadata></entry>"
    );

    let missing = harness
        .call(
            "qdrant-find",
            json!({ "query": "anything", "collection_name": "nonexistent-collection" }),
        )
        .await
        .expect("find on missing collection");
    assert_eq!(
        texts(&missing),
        vec!["No information found for the query: 'anything'".to_string()]
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn read_only_server_hides_store() {
    let harness =
        TestHarness::local(&[("COLLECTION_NAME", "memories"), ("READ_ONLY", "true")]).await;

    let tools = harness
        .service
        .list_tools(Some(PaginatedRequestParam { cursor: None }))
        .await
        .expect("list_tools");
    let names: Vec<_> = tools.tools.iter().map(|tool| tool.name.as_ref()).collect();
    assert_eq!(names, vec!["qdrant-find"]);

    let error = harness
        .call("qdrant-store", json!({ "information": "not allowed" }))
        .await
        .expect_err("store should be unknown");
    assert_invalid_params(error);

    harness.shutdown().await;
}

#[tokio::test]
async fn invalid_payloads_return_errors() {
    let harness = TestHarness::local(&[]).await;

    let error = harness
        .call("qdrant-store", json!({ "information": "" }))
        .await
        .expect_err("empty information");
    assert_invalid_params(error);

    let error = harness
        .call("qdrant-store", json!({ "information": "no collection anywhere" }))
        .await
        .expect_err("missing collection");
    assert_invalid_params(error);

    let error = harness
        .call("qdrant-find", json!({ "query": "cats", "limit": 0, "collection_name": "x" }))
        .await
        .expect_err("zero limit");
    assert_invalid_params(error);

    harness.shutdown().await;
}

#[tokio::test]
async fn store_and_find_through_qdrant_rest() {
    let server = MockServer::start_async().await;

    let schema_lookup = server
        .mock_async(|when, then| {
            when.method(GET).path("/collections/memories");
            then.status(404).json_body(json!({
                "status": { "error": "Not found: Collection `memories` doesn't exist!" },
                "time": 0.0
            }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/memories").json_body(json!({
                "vectors": { "hash-test": { "size": 16, "distance": "Cosine" } }
            }));
            then.status(200)
                .json_body(json!({ "status": "ok", "time": 0.0, "result": true }));
        })
        .await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/memories/points")
                .query_param("wait", "true");
            then.status(200).json_body(json!({
                "status": "ok",
                "time": 0.0,
                "result": { "operation_id": 1, "status": "completed" }
            }));
        })
        .await;
    let query = server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/memories/points/query");
            then.status(200).json_body(json!({
                "status": "ok",
                "time": 0.0,
                "result": { "points": [{
                    "id": "7f7c8a2e-0000-4000-8000-000000000001",
                    "score": 0.5,
                    "payload": { "document": "cats are great", "metadata": { "tag": "pets" } }
                }] }
            }));
        })
        .await;

    let backend = Arc::new(QdrantBackend::new(&server.base_url(), None).expect("qdrant backend"));
    let harness = TestHarness::new(backend, &[("COLLECTION_NAME", "memories")]).await;

    harness
        .call(
            "qdrant-store",
            json!({ "information": "cats are great", "metadata": { "tag": "pets" } }),
        )
        .await
        .expect("store tool call");
    harness
        .call("qdrant-store", json!({ "information": "dogs are loyal" }))
        .await
        .expect("second store tool call");

    let found = harness
        .call("qdrant-find", json!({ "query": "cats" }))
        .await
        .expect("find tool call");
    assert_eq!(
        texts(&found)[1],
        "<entry><content>cats are great</content><metadata>{\"tag\":\"pets\"}</metadata></entry>"
    );

    schema_lookup.assert_async().await;
    create.assert_async().await;
    upsert.assert_hits_async(2).await;
    query.assert_async().await;

    harness.shutdown().await;
}
