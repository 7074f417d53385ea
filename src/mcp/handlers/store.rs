//! Handler for the store tool.

use std::sync::Arc;

use crate::{
    mcp::{
        format::stored_message,
        handlers::{map_connector_error, non_blank, parse_arguments},
    },
    store::{Entry, Metadata, VectorStoreConnector},
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content, JsonObject},
};
use serde::Deserialize;

/// Arguments accepted by the store tool.
#[derive(Debug, Deserialize)]
pub(crate) struct StoreToolRequest {
    pub(crate) information: String,
    #[serde(default)]
    pub(crate) metadata: Option<Metadata>,
    #[serde(default)]
    pub(crate) collection_name: Option<String>,
}

/// Handle the store tool by embedding and persisting one memory.
pub(crate) async fn handle_store(
    connector: &Arc<VectorStoreConnector>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: StoreToolRequest = parse_arguments(arguments)?;
    if args.information.trim().is_empty() {
        return Err(McpError::invalid_params(
            "`information` must not be empty",
            None,
        ));
    }

    let collection_name = non_blank(args.collection_name);
    let collection = connector
        .resolve_collection(collection_name.as_deref())
        .map_err(|err| map_connector_error(err.into()))?;

    let mut entry = Entry::new(args.information);
    if let Some(metadata) = args.metadata {
        entry = entry.with_metadata(metadata);
    }
    let message = stored_message(&entry.content, &collection);

    connector
        .store(entry, Some(&collection))
        .await
        .map_err(map_connector_error)?;

    Ok(CallToolResult::success(vec![Content::text(message)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{embedding::HashEmbeddingProvider, store::LocalBackend};
    use rmcp::model::ErrorCode;
    use serde_json::{Value, json};

    fn connector(default_collection: Option<&str>) -> Arc<VectorStoreConnector> {
        Arc::new(VectorStoreConnector::new(
            Arc::new(LocalBackend::in_memory()),
            Arc::new(HashEmbeddingProvider::new("hash-test", 16)),
            default_collection.map(str::to_string),
        ))
    }

    fn arguments(value: Value) -> Option<JsonObject> {
        value.as_object().cloned()
    }

    #[tokio::test]
    async fn store_reports_target_collection() {
        let connector = connector(Some("memories"));
        let result = handle_store(
            &connector,
            arguments(json!({ "information": "likes tea", "metadata": { "topic": "drinks" } })),
        )
        .await
        .expect("store");

        let text = &result.content[0].as_text().expect("text content").text;
        assert_eq!(text, "Stored: likes tea in collection memories");
        assert_eq!(
            connector.list_collections().await.expect("list"),
            vec!["memories".to_string()]
        );
    }

    #[tokio::test]
    async fn explicit_collection_overrides_default() {
        let connector = connector(Some("memories"));
        let result = handle_store(
            &connector,
            arguments(json!({ "information": "likes tea", "collection_name": "drinks" })),
        )
        .await
        .expect("store");

        let text = &result.content[0].as_text().expect("text content").text;
        assert!(text.ends_with("in collection drinks"));
    }

    #[tokio::test]
    async fn empty_information_is_invalid() {
        let connector = connector(Some("memories"));
        let error = handle_store(&connector, arguments(json!({ "information": "  " })))
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn missing_collection_is_invalid() {
        let connector = connector(None);
        let error = handle_store(&connector, arguments(json!({ "information": "orphan" })))
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn non_object_metadata_is_invalid() {
        let connector = connector(Some("memories"));
        let error = handle_store(
            &connector,
            arguments(json!({ "information": "x", "metadata": "flat" })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    }
}
