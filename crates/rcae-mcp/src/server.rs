//! MCP Server Core
//!
//! Routes JSON-RPC requests to the tool dispatch table. All state lives in
//! the injected [`EngineContext`].

use tracing::{debug, warn};

use crate::context::EngineContext;
use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListResourcesResult,
    ListToolsResult, ReadResourceRequest, ServerCapabilities, ServerInfo, ToolDescription,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;

/// MCP Server implementation
pub struct McpServer {
    context: EngineContext,
    initialized: bool,
}

impl McpServer {
    pub fn new(context: EngineContext) -> Self {
        Self {
            context,
            initialized: false,
        }
    }

    /// Handle an incoming JSON-RPC request
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!("Rejecting request '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "notifications/initialized" => {
                return None;
            }
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params).await,
            "resources/list" => self.handle_resources_list().await,
            "resources/read" => self.handle_resources_read(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    async fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo {
                name: "rcae".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some({
                    let mut map = std::collections::HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                }),
                resources: None,
                prompts: None,
            },
            instructions: Some(
                "This server exposes a project-local retrieval and context assembly engine: \
                 a code graph, a semantic vector index, and a community-clustered entity graph \
                 over your notes, fused into token-bounded context packs. Use scan_code to index \
                 the repository, create_memory to record notes and decisions, graphrag_build to \
                 extract entities and relationships from memories, and assemble_context to pull a \
                 budget-capped context pack for a query."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = vec![
            ToolDescription::from_schema(tools::codegraph::schema_scan()),
            ToolDescription::from_schema(tools::codegraph::schema_stop_watch()),
            ToolDescription::from_schema(tools::codegraph::schema_get_node()),
            ToolDescription::from_schema(tools::codegraph::schema_update_summary()),
            ToolDescription::from_schema(tools::codegraph::schema_call_graph()),
            ToolDescription::from_schema(tools::codegraph::schema_find_implementations()),
            ToolDescription::from_schema(tools::codegraph::schema_dependency_tree()),
            ToolDescription::from_schema(tools::codegraph::schema_analyze_impact()),
            ToolDescription::from_schema(tools::codegraph::schema_summarize()),
            ToolDescription::from_schema(tools::codegraph::schema_unsummarized()),
            ToolDescription::from_schema(tools::codegraph::schema_batch_update_summaries()),
            ToolDescription::from_schema(tools::graphrag::schema_build()),
            ToolDescription::from_schema(tools::graphrag::schema_search()),
            ToolDescription::from_schema(tools::graphrag::schema_status()),
            ToolDescription::from_schema(tools::memory::schema_create()),
            ToolDescription::from_schema(tools::memory::schema_get()),
            ToolDescription::from_schema(tools::memory::schema_update()),
            ToolDescription::from_schema(tools::memory::schema_delete()),
            ToolDescription::from_schema(tools::memory::schema_list()),
            ToolDescription::from_schema(tools::relations::schema_link()),
            ToolDescription::from_schema(tools::relations::schema_get_related()),
            ToolDescription::from_schema(tools::relations::schema_find_path()),
            ToolDescription::from_schema(tools::relations::schema_delete()),
            ToolDescription::from_schema(tools::relations::schema_list_pending()),
            ToolDescription::from_schema(tools::relations::schema_list_cross_layer_suggestions()),
            ToolDescription::from_schema(tools::context::schema()),
        ];

        let result = ListToolsResult { tools };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("Missing tool call parameters")),
        };

        let ctx = &self.context;
        let outcome: Result<serde_json::Value, String> = match request.name.as_str() {
            "scan_code" => tools::codegraph::execute_scan(ctx, request.arguments).await,
            "stop_code_watch" => tools::codegraph::execute_stop_watch(ctx, request.arguments).await,
            "get_code_node" => tools::codegraph::execute_get_node(ctx, request.arguments).await,
            "update_node_summary" => tools::codegraph::execute_update_summary(ctx, request.arguments).await,
            "get_call_graph" => tools::codegraph::execute_call_graph(ctx, request.arguments).await,
            "find_implementations" => tools::codegraph::execute_find_implementations(ctx, request.arguments).await,
            "get_dependency_tree" => tools::codegraph::execute_dependency_tree(ctx, request.arguments).await,
            "analyze_impact" => tools::codegraph::execute_analyze_impact(ctx, request.arguments).await,
            "summarize_code" => tools::codegraph::execute_summarize(ctx, request.arguments).await,
            "get_unsummarized" => tools::codegraph::execute_unsummarized(ctx, request.arguments).await,
            "batch_update_summaries" => {
                tools::codegraph::execute_batch_update_summaries(ctx, request.arguments).await
            }
            "graphrag_build" => tools::graphrag::execute_build(ctx, request.arguments).await,
            "graphrag_search" => tools::graphrag::execute_search(ctx, request.arguments).await,
            "graphrag_status" => tools::graphrag::execute_status(ctx, request.arguments).await,
            "create_memory" => tools::memory::execute_create(ctx, request.arguments).await,
            "get_memory" => tools::memory::execute_get(ctx, request.arguments).await,
            "update_memory" => tools::memory::execute_update(ctx, request.arguments).await,
            "delete_memory" => tools::memory::execute_delete(ctx, request.arguments).await,
            "list_memories" => tools::memory::execute_list(ctx, request.arguments).await,
            "link_memories" => tools::relations::execute_link(ctx, request.arguments).await,
            "get_related" => tools::relations::execute_get_related(ctx, request.arguments).await,
            "find_path" => tools::relations::execute_find_path(ctx, request.arguments).await,
            "delete_relation" => tools::relations::execute_delete(ctx, request.arguments).await,
            "list_pending" => tools::relations::execute_list_pending(ctx, request.arguments).await,
            "list_cross_layer_suggestions" => {
                tools::relations::execute_list_cross_layer_suggestions(ctx, request.arguments).await
            }
            "assemble_context" => tools::context::execute(ctx, request.arguments).await,
            other => Err(format!("unknown tool `{other}`")),
        };

        let call_result = match outcome {
            Ok(value) => CallToolResult::ok(value),
            Err(message) => CallToolResult::error(message),
        };
        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    /// No MCP resources are exposed; everything is reachable via tools.
    async fn handle_resources_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let result = ListResourcesResult { resources: Vec::new() };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_resources_read(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: ReadResourceRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("Missing resource URI")),
        };
        Err(JsonRpcError::resource_not_found(&request.uri))
    }
}
