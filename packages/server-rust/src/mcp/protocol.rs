//! MCP payload types for `initialize`, `tools/list` and `tools/call`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tailnet_mcp_core::{Arguments, ToolResult};

use crate::service::ToolName;

/// Newest protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Revisions accepted during negotiation, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = [PROTOCOL_VERSION, "2025-03-26", "2024-11-05"];

pub const SERVER_NAME: &str = "tailnet-mcp";

/// Echoes the client's revision when supported, otherwise offers the newest.
#[must_use]
pub fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.into_iter().find(|s| *s == v))
        .unwrap_or(PROTOCOL_VERSION)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: &'static str,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

impl InitializeResult {
    #[must_use]
    pub fn new(protocol_version: &'static str) -> Self {
        Self {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME,
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

impl From<ToolName> for ToolDescriptor {
    fn from(tool: ToolName) -> Self {
        Self {
            name: tool.as_str(),
            description: tool.description(),
            input_schema: tool.input_schema(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDescriptor>,
}

impl ToolsListResult {
    #[must_use]
    pub fn all() -> Self {
        Self {
            tools: ToolName::ALL.into_iter().map(ToolDescriptor::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    /// `null` and absent both mean "no arguments".
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

impl CallToolParams {
    #[must_use]
    pub fn into_arguments(self) -> (String, Arguments) {
        (self.name, self.arguments.unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Wire form of a tool result: one text item plus the error flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    pub is_error: bool,
}

impl From<ToolResult> for CallToolResult {
    fn from(result: ToolResult) -> Self {
        let is_error = result.is_error();
        let text = match result {
            ToolResult::Success { payload } => payload,
            ToolResult::Failure { message } => message,
        };
        Self {
            content: vec![TextContent {
                kind: "text".to_string(),
                text,
            }],
            is_error,
        }
    }
}
