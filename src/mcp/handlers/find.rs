//! Handler for the find tool.

use std::sync::Arc;

use crate::{
    mcp::{
        format::{format_entry, no_results_message, results_header},
        handlers::{map_connector_error, non_blank, parse_arguments},
    },
    store::VectorStoreConnector,
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content, JsonObject},
};
use serde::Deserialize;

/// Arguments accepted by the find tool.
#[derive(Debug, Deserialize)]
pub(crate) struct FindToolRequest {
    pub(crate) query: String,
    #[serde(default)]
    pub(crate) collection_name: Option<String>,
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

/// Handle the find tool by running a similarity search over stored memories.
pub(crate) async fn handle_find(
    connector: &Arc<VectorStoreConnector>,
    default_limit: usize,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: FindToolRequest = parse_arguments(arguments)?;
    if args.query.trim().is_empty() {
        return Err(McpError::invalid_params("`query` must not be empty", None));
    }
    let limit = match args.limit {
        None => default_limit,
        Some(value) if value > 0 => usize::try_from(value).unwrap_or(usize::MAX),
        Some(_) => {
            return Err(McpError::invalid_params(
                "`limit` must be a positive integer",
                None,
            ));
        }
    };

    let collection_name = non_blank(args.collection_name);
    let entries = connector
        .search(&args.query, collection_name.as_deref(), limit)
        .await
        .map_err(map_connector_error)?;

    if entries.is_empty() {
        return Ok(CallToolResult::success(vec![Content::text(
            no_results_message(&args.query),
        )]));
    }

    let mut content = Vec::with_capacity(entries.len() + 1);
    content.push(Content::text(results_header(&args.query)));
    content.extend(entries.iter().map(|entry| Content::text(format_entry(entry))));
    Ok(CallToolResult::success(content))
}
