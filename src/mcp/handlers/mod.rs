//! Tool handlers for the MCP server.

use crate::store::{ConfigurationError, ConnectorError};
use rmcp::{ErrorData as McpError, model::JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod find;
pub mod store;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Treat blank optional strings as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Map connector failures onto MCP error codes.
pub(crate) fn map_connector_error(error: ConnectorError) -> McpError {
    match error {
        ConnectorError::InvalidLimit
        | ConnectorError::Configuration(ConfigurationError::MissingCollection) => {
            McpError::invalid_params(error.to_string(), None)
        }
        ConnectorError::Configuration(source) => McpError::internal_error(source.to_string(), None),
        ConnectorError::Embedding(source) => {
            McpError::internal_error(format!("Embedding provider error: {source}"), None)
        }
        ConnectorError::Backend(source) => {
            McpError::internal_error(format!("Vector database request failed: {source}"), None)
        }
    }
}
