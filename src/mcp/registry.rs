use std::{collections::HashMap, future::Future, pin::Pin};

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolRequestParam, CallToolResult};

use super::server::VectorDbMcpServer;

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<CallToolResult, McpError>> + Send>>;

pub type ToolHandler = fn(&VectorDbMcpServer, CallToolRequestParam) -> ToolFuture;

/// Registry mapping tool names to handler functions.
///
/// Names carry the backend prefix (`qdrant-find`, `opensearch-store`), so keys are owned.
pub struct Registry {
    pub tools: HashMap<String, ToolHandler>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register_tool(&mut self, name: impl Into<String>, handler: ToolHandler) {
        self.tools.insert(name.into(), handler);
    }
}
