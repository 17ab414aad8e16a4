//! Tool identities, the per-call request type, and pipeline errors.

use std::fmt;

use serde_json::{json, Value};
use tailnet_mcp_core::{Arguments, RequestContext};

/// Name of the single argument taken by the device tools.
pub const DEVICE_ID: &str = "deviceID";

/// The fixed set of tools exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ListDevices,
    GetDeviceDetails,
    GetDeviceRoutes,
    GetAcl,
    ListKeys,
}

impl ToolName {
    /// Every tool, in the order advertised by `tools/list`.
    pub const ALL: [ToolName; 5] = [
        ToolName::ListDevices,
        ToolName::GetDeviceDetails,
        ToolName::GetDeviceRoutes,
        ToolName::GetAcl,
        ToolName::ListKeys,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListDevices => "list_devices",
            Self::GetDeviceDetails => "get_device_details",
            Self::GetDeviceRoutes => "get_device_routes",
            Self::GetAcl => "get_acl",
            Self::ListKeys => "list_keys",
        }
    }

    /// Looks up a tool by its wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::ListDevices => "List all devices in the Tailscale network",
            Self::GetDeviceDetails => "Get detailed information about a specific device",
            Self::GetDeviceRoutes => "Get subnet routes for a specific device",
            Self::GetAcl => "Get the current ACL (Access Control List) for the tailnet",
            Self::ListKeys => "List all API keys for the tailnet",
        }
    }

    /// Argument names accepted by this tool.
    #[must_use]
    pub fn allowed_arguments(self) -> &'static [&'static str] {
        match self {
            Self::GetDeviceDetails | Self::GetDeviceRoutes => &[DEVICE_ID],
            Self::ListDevices | Self::GetAcl | Self::ListKeys => &[],
        }
    }

    /// JSON schema of the tool's arguments. Extra properties are forbidden.
    #[must_use]
    pub fn input_schema(self) -> Value {
        match self {
            Self::GetDeviceDetails | Self::GetDeviceRoutes => {
                let purpose = if self == Self::GetDeviceDetails {
                    "The device ID to get details for"
                } else {
                    "The device ID to get routes for"
                };
                json!({
                    "type": "object",
                    "properties": {
                        DEVICE_ID: { "type": "string", "description": purpose },
                    },
                    "required": [DEVICE_ID],
                    "additionalProperties": false,
                })
            }
            Self::ListDevices | Self::GetAcl | Self::ListKeys => json!({
                "type": "object",
                "additionalProperties": false,
            }),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tool invocation travelling through the pipeline.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Process-unique sequence number, used in logs.
    pub call_id: u64,
    pub name: ToolName,
    pub arguments: Arguments,
    /// Request correlation data. `None` when the call did not arrive through
    /// the HTTP middleware (e.g. direct use in tests).
    pub ctx: Option<RequestContext>,
    /// Deadline for the whole call, enforced by the timeout layer.
    pub call_timeout_ms: u64,
}

impl ToolCall {
    #[must_use]
    pub fn new(call_id: u64, name: ToolName, arguments: Arguments, call_timeout_ms: u64) -> Self {
        Self {
            call_id,
            name,
            arguments,
            ctx: None,
            call_timeout_ms,
        }
    }

    #[must_use]
    pub fn with_context(mut self, ctx: Option<RequestContext>) -> Self {
        self.ctx = ctx;
        self
    }

    /// Correlation id, or `""` without a request context.
    #[must_use]
    pub fn request_id(&self) -> &str {
        RequestContext::request_id_of(self.ctx.as_ref())
    }
}

/// Errors that stop a tool call from producing a result at all.
///
/// Validation, backend and serialization problems are not errors at this
/// level: they are reported inside a failure `ToolResult`.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("{tool} timed out after {timeout_ms}ms")]
    Timeout { tool: ToolName, timeout_ms: u64 },
}
