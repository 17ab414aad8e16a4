//! Per-call deadline for tool calls.
//!
//! A call that outlives its `call_timeout_ms` fails with
//! `OperationError::Timeout` naming the tool. The handler future is dropped
//! on expiry, which cancels any backend request in flight.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tailnet_mcp_core::ToolResult;
use tower::{Layer, Service};
use tracing::warn;

use crate::service::operation::{OperationError, ToolCall};

/// Wraps the tool handlers with the deadline carried by each [`ToolCall`].
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<ToolCall> for TimeoutService<S>
where
    S: Service<ToolCall, Response = ToolResult, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = ToolResult;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<ToolResult, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ToolCall) -> Self::Future {
        let tool = call.name;
        let timeout_ms = call.call_timeout_ms;
        let request_id = call.request_id().to_owned();
        let deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
        let fut = self.inner.call(call);

        Box::pin(async move {
            tokio::select! {
                result = fut => result,
                () = deadline => {
                    warn!(%tool, timeout_ms, %request_id, "tool call abandoned at deadline");
                    Err(OperationError::Timeout { tool, timeout_ms })
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tailnet_mcp_core::Arguments;
    use tower::ServiceExt;

    use super::*;
    use crate::service::operation::ToolName;

    /// Service that takes a configurable delay before responding.
    struct SlowService {
        delay_ms: u64,
    }

    impl Service<ToolCall> for SlowService {
        type Response = ToolResult;
        type Error = OperationError;
        type Future = Pin<Box<dyn Future<Output = Result<ToolResult, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _call: ToolCall) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(ToolResult::success("[]"))
            })
        }
    }

    fn make_call(timeout_ms: u64) -> ToolCall {
        ToolCall::new(1, ToolName::ListDevices, Arguments::new(), timeout_ms)
    }

    #[tokio::test]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 10 });
        let resp = svc.oneshot(make_call(1000)).await.unwrap();
        assert_eq!(resp.text(), "[]");
    }

    #[tokio::test]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_call(50)).await.unwrap_err();
        assert!(matches!(
            err,
            OperationError::Timeout {
                tool: ToolName::ListDevices,
                timeout_ms: 50
            }
        ));
        assert_eq!(err.to_string(), "list_devices timed out after 50ms");
    }
}
