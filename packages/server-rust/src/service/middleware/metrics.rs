//! Metrics middleware for tool calls.
//!
//! Records call duration and outcome in a `tracing` span and through the
//! `metrics` facade, so an installed Prometheus recorder picks them up.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tailnet_mcp_core::ToolResult;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{OperationError, ToolCall};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments tool calls with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records call duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

/// Outcome label: `ok`, `tool_error` (failure envelope) or `error` (no result).
fn outcome_of(result: &Result<ToolResult, OperationError>) -> &'static str {
    match result {
        Ok(r) if r.is_error() => "tool_error",
        Ok(_) => "ok",
        Err(_) => "error",
    }
}

impl<S> Service<ToolCall> for MetricsService<S>
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
        let tool = call.name.as_str();
        let call_id = call.call_id;

        let span = info_span!(
            "tool_call",
            tool = tool,
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(call);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();
                let outcome = outcome_of(&result);

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!("tailnet_mcp_tool_calls_total", "tool" => tool, "outcome" => outcome)
                    .increment(1);
                metrics::histogram!("tailnet_mcp_tool_call_duration_seconds", "tool" => tool)
                    .record(elapsed.as_secs_f64());

                tracing::info!(
                    tool = tool,
                    call_id = call_id,
                    duration_ms = duration_ms,
                    outcome = outcome,
                    "tool call complete"
                );

                result
            }
            .instrument(span),
        )
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

    /// Immediately-completing service that echoes the call id.
    struct ImmediateService;

    impl Service<ToolCall> for ImmediateService {
        type Response = ToolResult;
        type Error = OperationError;
        type Future = Pin<Box<dyn Future<Output = Result<ToolResult, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, call: ToolCall) -> Self::Future {
            let call_id = call.call_id;
            Box::pin(async move { Ok(ToolResult::success(call_id.to_string())) })
        }
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(ImmediateService);
        let call = ToolCall::new(42, ToolName::GetAcl, Arguments::new(), 5000);

        let resp = svc.oneshot(call).await.unwrap();
        assert_eq!(resp.text(), "42");
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome_of(&Ok(ToolResult::success("{}"))), "ok");
        assert_eq!(outcome_of(&Ok(ToolResult::failure("ctx", "boom"))), "tool_error");
        assert_eq!(
            outcome_of(&Err(OperationError::Timeout {
                tool: ToolName::ListKeys,
                timeout_ms: 1
            })),
            "error"
        );
    }
}
