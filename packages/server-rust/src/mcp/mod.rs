//! Model Context Protocol over JSON-RPC 2.0.
//!
//! - [`jsonrpc`]: request/response envelopes and error codes
//! - [`protocol`]: MCP payloads (`initialize`, `tools/list`, `tools/call`)
//!
//! [`McpHandler`] dispatches one parsed request. Tool calls go through the
//! tower pipeline built in [`crate::service`].

pub mod jsonrpc;
pub mod protocol;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{json, Value};
use tailnet_mcp_core::RequestContext;
use tower::ServiceExt;
use tracing::{debug, warn, Instrument};

pub use jsonrpc::{JsonRpcRequest, JsonRpcResponse, RequestId, RpcError};
pub use protocol::{CallToolResult, PROTOCOL_VERSION, SERVER_NAME};

use crate::service::{OperationError, ServiceConfig, ToolCall, ToolName, ToolPipeline};
use protocol::{negotiate_version, CallToolParams, InitializeParams, InitializeResult, ToolsListResult};

/// Dispatches JSON-RPC requests to MCP methods.
pub struct McpHandler {
    pipeline: ToolPipeline,
    next_call_id: AtomicU64,
    call_timeout_ms: u64,
}

impl McpHandler {
    #[must_use]
    pub fn new(pipeline: ToolPipeline, config: &ServiceConfig) -> Self {
        Self {
            pipeline,
            next_call_id: AtomicU64::new(1),
            call_timeout_ms: config.default_call_timeout_ms,
        }
    }

    /// Handles one request. Returns `None` for notifications, which get no reply.
    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        ctx: Option<RequestContext>,
    ) -> Option<JsonRpcResponse> {
        let span = RequestContext::logger_of(ctx.as_ref());
        async move {
            if request.is_notification() {
                debug!(method = %request.method, "notification received");
                return None;
            }

            let JsonRpcRequest {
                id, method, params, ..
            } = request;
            let result = match method.as_str() {
                "initialize" => initialize(params),
                "ping" => Ok(json!({})),
                "tools/list" => to_result(&ToolsListResult::all()),
                "tools/call" => self.call_tool(params, ctx).await,
                other => Err(RpcError::MethodNotFound(other.to_string())),
            };

            Some(match result {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => {
                    warn!(method = %method, code = e.code(), error = %e, "request rejected");
                    JsonRpcResponse::error(id, &e)
                }
            })
        }
        .instrument(span)
        .await
    }

    async fn call_tool(
        &self,
        params: Option<Value>,
        ctx: Option<RequestContext>,
    ) -> Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::InvalidParams("missing params".to_string()))?;
        let params: CallToolParams =
            serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))?;
        let (name, arguments) = params.into_arguments();
        let tool = ToolName::parse(&name).ok_or(OperationError::UnknownTool { name })?;

        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let call = ToolCall::new(call_id, tool, arguments, self.call_timeout_ms).with_context(ctx);

        let result = self.pipeline.clone().oneshot(call).await?;
        to_result(&CallToolResult::from(result))
    }
}

fn initialize(params: Option<Value>) -> Result<Value, RpcError> {
    let params: InitializeParams = match params {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| RpcError::InvalidParams(e.to_string()))?
        }
        None => InitializeParams::default(),
    };
    let version = negotiate_version(params.protocol_version.as_deref());
    to_result(&InitializeResult::new(version))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tailnet_mcp_core::{Device, TailnetClient};

    use super::jsonrpc::codes;
    use super::*;
    use crate::backend::MemoryTailnet;
    use crate::service::{build_tool_pipeline, ToolHandlers};

    fn handler(tailnet: &Arc<MemoryTailnet>, timeout_ms: u64) -> McpHandler {
        let client: Arc<dyn TailnetClient> = Arc::clone(tailnet) as Arc<dyn TailnetClient>;
        let pipeline = build_tool_pipeline(ToolHandlers::new(client));
        McpHandler::new(
            pipeline,
            &ServiceConfig {
                default_call_timeout_ms: timeout_ms,
            },
        )
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(RequestId::Number(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    fn tailnet() -> Arc<MemoryTailnet> {
        Arc::new(MemoryTailnet::new().with_devices(vec![Device {
            id: "device1".to_string(),
            name: "test-device-1".to_string(),
            ..Device::default()
        }]))
    }

    #[tokio::test]
    async fn initialize_negotiates_version() {
        let mcp = handler(&tailnet(), 1000);
        let resp = mcp
            .handle(request(1, "initialize", json!({ "protocolVersion": "2025-03-26" })), None)
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(resp.id, Some(RequestId::Number(1)));
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let mcp = handler(&tailnet(), 1000);
        let note = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(mcp.handle(note, None).await.is_none());
    }

    #[tokio::test]
    async fn ping_and_tools_list() {
        let mcp = handler(&tailnet(), 1000);
        let pong = mcp.handle(request(2, "ping", json!({})), None).await.unwrap();
        assert_eq!(pong.result, Some(json!({})));

        let list = mcp.handle(request(3, "tools/list", json!({})), None).await.unwrap();
        assert_eq!(list.result.unwrap()["tools"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let mcp = handler(&tailnet(), 1000);
        let resp = mcp.handle(request(4, "resources/list", json!({})), None).await.unwrap();
        assert_eq!(resp.error.unwrap().code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_returns_envelope() {
        let memory = tailnet();
        let mcp = handler(&memory, 1000);
        let resp = mcp
            .handle(
                request(5, "tools/call", json!({ "name": "get_device_details", "arguments": { "deviceID": "device1" } })),
                Some(RequestContext::new("abc".to_string(), tracing::Span::none())),
            )
            .await
            .unwrap();

        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(!result.is_error);
        assert!(result.content[0].text.contains("test-device-1"));
        assert_eq!(memory.devices.calls(), 1);
    }

    #[tokio::test]
    async fn tool_failure_is_a_result_not_an_error() {
        let memory = tailnet();
        let mcp = handler(&memory, 1000);
        let resp = mcp
            .handle(
                request(6, "tools/call", json!({ "name": "get_device_details", "arguments": {} })),
                None,
            )
            .await
            .unwrap();

        assert!(resp.error.is_none());
        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(result.is_error);
        assert!(result.content[0].text.contains("deviceID parameter is required"));
        assert_eq!(memory.total_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let mcp = handler(&tailnet(), 1000);
        let resp = mcp
            .handle(request(7, "tools/call", json!({ "name": "delete_device" })), None)
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, codes::INVALID_PARAMS);
        assert!(error.message.contains("delete_device"));
    }

    #[tokio::test]
    async fn malformed_call_params_are_invalid() {
        let mcp = handler(&tailnet(), 1000);
        let missing = mcp.handle(
            JsonRpcRequest {
                params: None,
                ..request(8, "tools/call", Value::Null)
            },
            None,
        );
        assert_eq!(missing.await.unwrap().error.unwrap().code, codes::INVALID_PARAMS);

        let bad_args = mcp
            .handle(
                request(9, "tools/call", json!({ "name": "get_acl", "arguments": [1, 2] })),
                None,
            )
            .await
            .unwrap();
        assert_eq!(bad_args.error.unwrap().code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn slow_tool_is_internal_error() {
        let memory = tailnet();
        memory.keys.delay_by(Duration::from_millis(500));
        let mcp = handler(&memory, 20);

        let resp = mcp
            .handle(request(10, "tools/call", json!({ "name": "list_keys" })), None)
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, codes::INTERNAL_ERROR);
        assert!(error.message.contains("list_keys timed out after 20ms"));
    }
}
