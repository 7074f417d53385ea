//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    config::ToolSettings,
    mcp::{
        handlers::{find::handle_find, store::handle_store},
        registry, schemas,
    },
    store::VectorStoreConnector,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, ListToolsResult, ServerCapabilities, ServerInfo,
        Tool, ToolAnnotations,
    },
};

/// MCP server exposing the store and find tools over a vector database.
#[derive(Clone)]
pub struct VectorDbMcpServer {
    connector: Arc<VectorStoreConnector>,
    settings: Arc<ToolSettings>,
    prefix: &'static str,
    registry: Arc<registry::Registry>,
}

impl VectorDbMcpServer {
    /// Create a server whose tools are named `<prefix>-find` and `<prefix>-store`.
    ///
    /// The store tool is left out entirely when `settings.read_only` is set.
    pub fn new(
        connector: Arc<VectorStoreConnector>,
        settings: ToolSettings,
        prefix: &'static str,
    ) -> Self {
        let mut registry = registry::Registry::new();
        registry.register_tool(format!("{prefix}-find"), tool_find);
        if !settings.read_only {
            registry.register_tool(format!("{prefix}-store"), tool_store);
        }

        tracing::debug!(
            prefix,
            read_only = settings.read_only,
            tools = registry.tools.len(),
            "MCP tools registered"
        );

        Self {
            connector,
            settings: Arc::new(settings),
            prefix,
            registry: Arc::new(registry),
        }
    }

    /// Names of the tools this server answers, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.tools.keys().cloned().collect();
        names.sort();
        names
    }

    fn describe_tools(&self) -> Vec<Tool> {
        let mut tools = vec![Tool {
            name: Cow::Owned(format!("{}-find", self.prefix)),
            title: Some("Find Memories".to_string()),
            description: Some(Cow::Owned(self.settings.find_description.clone())),
            input_schema: Arc::new(schemas::find_input_schema(self.settings.search_limit)),
            output_schema: None,
            annotations: Some(
                ToolAnnotations::with_title("Find Memories")
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            icons: None,
        }];

        if !self.settings.read_only {
            tools.push(Tool {
                name: Cow::Owned(format!("{}-store", self.prefix)),
                title: Some("Store Memory".to_string()),
                description: Some(Cow::Owned(self.settings.store_description.clone())),
                input_schema: Arc::new(schemas::store_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Store Memory")
                        .destructive(false)
                        .idempotent(false)
                        .open_world(false),
                ),
                icons: None,
            });
        }

        tools
    }
}

fn tool_find(server: &VectorDbMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let connector = server.connector.clone();
    let default_limit = server.settings.search_limit;
    Box::pin(async move { handle_find(&connector, default_limit, request.arguments).await })
}

fn tool_store(server: &VectorDbMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let connector = server.connector.clone();
    Box::pin(async move { handle_store(&connector, request.arguments).await })
}

impl ServerHandler for VectorDbMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "vectordb-mcp".to_string();
        implementation.title = Some("Vector Database MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        let instructions = if self.settings.read_only {
            "Use the find tool to recall memories stored in the vector database by meaning."
        } else {
            "Use the store tool to keep memories in the vector database and the find tool to recall them by meaning."
        };

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: implementation,
            instructions: Some(instructions.into()),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tools.get(request.name.as_ref()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}
