//! Pipeline composition: combines all middleware layers into a single service stack.

use tailnet_mcp_core::ToolResult;
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::operation::{OperationError, ToolCall};
use crate::service::tools::ToolHandlers;

/// Type-erased tool pipeline shared by every request handler.
pub type ToolPipeline = BoxCloneSyncService<ToolCall, ToolResult, OperationError>;

/// Build the tool pipeline by wrapping the handlers with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome, timeouts included
/// 2. `TimeoutLayer` -- enforce the per-call deadline
#[must_use]
pub fn build_tool_pipeline(handlers: ToolHandlers) -> ToolPipeline {
    let svc = ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(TimeoutLayer)
        .service(handlers);
    BoxCloneSyncService::new(svc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
