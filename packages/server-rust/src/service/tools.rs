//! Tool handlers: validate arguments, make one backend call, build the result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Serialize;
use tailnet_mcp_core::{
    reject_unknown_arguments, require_string, validate_identifier, Arguments, RequestContext,
    TailnetClient, ToolResult,
};
use tower::Service;
use tracing::{debug, warn, Instrument};

use super::operation::{OperationError, ToolCall, ToolName, DEVICE_ID};

/// Runs tool calls against a [`TailnetClient`].
///
/// Cloning is cheap; all clones share the same client.
#[derive(Clone)]
pub struct ToolHandlers {
    client: Arc<dyn TailnetClient>,
}

impl ToolHandlers {
    #[must_use]
    pub fn new(client: Arc<dyn TailnetClient>) -> Self {
        Self { client }
    }

    /// Runs `call` and always produces a result. Every failure, whatever the
    /// stage, becomes a [`ToolResult::Failure`].
    pub async fn handle(&self, call: &ToolCall) -> ToolResult {
        if let Err(e) = reject_unknown_arguments(&call.arguments, call.name.allowed_arguments()) {
            return ToolResult::failure("Invalid arguments", e);
        }

        let result = match call.name {
            ToolName::ListDevices => self.list_devices().await,
            ToolName::GetDeviceDetails => self.get_device_details(&call.arguments).await,
            ToolName::GetDeviceRoutes => self.get_device_routes(&call.arguments).await,
            ToolName::GetAcl => self.get_acl().await,
            ToolName::ListKeys => self.list_keys().await,
        };

        let request_id = call.request_id();
        match &result {
            ToolResult::Success { .. } => {
                debug!(tool = %call.name, %request_id, "tool succeeded");
            }
            ToolResult::Failure { message } => {
                warn!(tool = %call.name, %request_id, error = %message, "tool failed");
            }
        }
        result
    }

    pub async fn list_devices(&self) -> ToolResult {
        match self.client.devices().list_with_all_fields().await {
            Ok(devices) => render(&devices, "Failed to serialize device list"),
            Err(e) => ToolResult::failure("Failed to list devices", e),
        }
    }

    pub async fn get_device_details(&self, args: &Arguments) -> ToolResult {
        let device_id = match device_id(args) {
            Ok(id) => id,
            Err(failure) => return failure,
        };

        match self.client.devices().get_with_all_fields(device_id).await {
            Ok(device) => render(&device, "Failed to serialize device details"),
            Err(e) => ToolResult::failure("Failed to get device details", e),
        }
    }

    pub async fn get_device_routes(&self, args: &Arguments) -> ToolResult {
        let device_id = match device_id(args) {
            Ok(id) => id,
            Err(failure) => return failure,
        };

        match self.client.devices().subnet_routes(device_id).await {
            Ok(routes) => render(&routes, "Failed to serialize device routes"),
            Err(e) => ToolResult::failure("Failed to get device routes", e),
        }
    }

    pub async fn get_acl(&self) -> ToolResult {
        match self.client.policy_file().get().await {
            Ok(acl) => render(&acl, "Failed to serialize ACL policy"),
            Err(e) => ToolResult::failure("Failed to get ACL policy", e),
        }
    }

    /// Always asks for every key on the tailnet, not only the caller's own.
    pub async fn list_keys(&self) -> ToolResult {
        match self.client.keys().list(true).await {
            Ok(keys) => render(&keys, "Failed to serialize API keys"),
            Err(e) => ToolResult::failure("Failed to list API keys", e),
        }
    }
}

/// Extracts and validates the `deviceID` argument.
fn device_id(args: &Arguments) -> Result<&str, ToolResult> {
    let id = require_string(args, DEVICE_ID)
        .map_err(|e| ToolResult::failure("Invalid device ID parameter", e))?;
    validate_identifier(id).map_err(|e| ToolResult::failure("Device ID validation failed", e))?;
    Ok(id)
}

fn render<T: Serialize + ?Sized>(value: &T, context: &str) -> ToolResult {
    ToolResult::from_serialized(value, context)
}

impl Service<ToolCall> for ToolHandlers {
    type Response = ToolResult;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<ToolResult, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: ToolCall) -> Self::Future {
        let handlers = self.clone();
        let span = RequestContext::logger_of(call.ctx.as_ref());
        Box::pin(async move { Ok(handlers.handle(&call).await) }.instrument(span))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
