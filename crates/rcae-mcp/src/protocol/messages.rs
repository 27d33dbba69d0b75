//! MCP method payload types
//!
//! The typed request/response bodies carried inside [`super::types::JsonRpcRequest`]
//! and [`super::types::JsonRpcResponse`] for the `initialize`, `tools/*`, and
//! `resources/*` methods.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// INITIALIZE
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "protocolVersion", default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: serde_json::Value,
    #[serde(rename = "clientInfo", default)]
    pub client_info: serde_json::Value,
}

fn default_protocol_version() -> String {
    super::types::MCP_VERSION.to_string()
}

impl Default for InitializeRequest {
    fn default() -> Self {
        Self {
            protocol_version: default_protocol_version(),
            capabilities: serde_json::json!({}),
            client_info: serde_json::json!({}),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ============================================================================
// TOOLS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescription {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl ToolDescription {
    /// Builds a description from a tool module's `{name, description, inputSchema}`
    /// literal, the shape every `schema_*()` function in `tools/` returns.
    pub fn from_schema(value: serde_json::Value) -> Self {
        Self {
            name: value
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            description: value
                .get("description")
                .and_then(|v| v.as_str())
                .map(String::from),
            input_schema: value.get("inputSchema").cloned().unwrap_or(serde_json::json!({})),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ToolResultContent {
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CallToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn ok(value: serde_json::Value) -> Self {
        let text = serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ToolResultContent::Text { text }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: message.into() }],
            is_error: true,
        }
    }
}

// ============================================================================
// RESOURCES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescription {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResourcesResult {
    pub resources: Vec<ResourceDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadResourceRequest {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_tool_result_ok_wraps_pretty_json() {
        let result = CallToolResult::ok(serde_json::json!({"a": 1}));
        assert!(!result.is_error);
        match &result.content[0] {
            ToolResultContent::Text { text } => assert!(text.contains("\"a\"")),
        }
    }

    #[test]
    fn test_initialize_request_defaults_protocol_version() {
        let req = InitializeRequest::default();
        assert_eq!(req.protocol_version, super::super::types::MCP_VERSION);
    }
}
