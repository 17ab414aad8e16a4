//! HTTP middleware stack.
//!
//! CORS wraps the whole router. The correlation and timeout layers wrap only
//! `POST /mcp`, so health probes and metrics scrapes never enter the latency
//! window. Within a stack the first layer listed is the outermost.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::header::{HeaderName, HeaderValue, USER_AGENT};
use axum::http::{Method, Request, Response, StatusCode};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::TryRngCore;
use tailnet_mcp_core::RequestContext;
use tower::{Layer, Service, ServiceBuilder};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{info, info_span, warn, Instrument};

use super::config::NetworkConfig;
use super::shutdown::ShutdownController;
use crate::metrics::Metrics;

/// Response header echoing the correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Length of a correlation id in hex characters.
const REQUEST_ID_LEN: usize = 32;

/// The composed Tower layer type produced by [`build_mcp_layers`].
type McpLayers = tower::layer::util::Stack<
    TimeoutLayer,
    tower::layer::util::Stack<RequestContextLayer, tower::layer::util::Identity>,
>;

/// Builds the middleware stack for the MCP endpoint.
///
/// **Ordering (outermost to innermost):**
/// 1. `RequestContext` -- correlation id, request span, logging, metrics
/// 2. `Timeout` -- enforces a maximum request processing duration (408)
///
/// A timed-out request is therefore still logged and counted as an error.
#[must_use]
pub fn build_mcp_layers(
    config: &NetworkConfig,
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownController>,
) -> McpLayers {
    ServiceBuilder::new()
        .layer(RequestContextLayer::new(metrics, shutdown))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .into_inner()
}

/// Builds the CORS layer from the configured list of allowed origins.
///
/// A wildcard `"*"` in the origins list allows any origin. Otherwise,
/// each origin string is parsed and added to an explicit allowlist.
pub(crate) fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([X_REQUEST_ID])
}

/// Generates a 32-character hex correlation id from 16 OS-random bytes.
///
/// Falls back to the hex-encoded current timestamp when the OS random
/// source fails. Never panics.
#[must_use]
pub fn generate_request_id() -> String {
    let mut bytes = [0u8; REQUEST_ID_LEN / 2];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => hex::encode(bytes),
        Err(e) => {
            warn!(error = %e, "OS random source failed, using timestamp request id");
            fallback_request_id(Utc::now())
        }
    }
}

fn fallback_request_id(now: DateTime<Utc>) -> String {
    let mut id = hex::encode(now.to_rfc3339_opts(SecondsFormat::Nanos, true));
    id.truncate(REQUEST_ID_LEN);
    id
}

// ---------------------------------------------------------------------------
// RequestContextLayer
// ---------------------------------------------------------------------------

/// Tower layer that attaches a [`RequestContext`] to every request and
/// records the outcome into [`Metrics`].
#[derive(Clone)]
pub struct RequestContextLayer {
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownController>,
}

impl RequestContextLayer {
    #[must_use]
    pub fn new(metrics: Arc<Metrics>, shutdown: Arc<ShutdownController>) -> Self {
        Self { metrics, shutdown }
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService {
            inner,
            metrics: Arc::clone(&self.metrics),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

#[derive(Clone)]
pub struct RequestContextService<S> {
    inner: S,
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownController>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestContextService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: std::fmt::Display,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let request_id = generate_request_id();
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
            remote_addr = %remote_addr,
            user_agent = %user_agent,
        );
        req.extensions_mut()
            .insert(RequestContext::new(request_id.clone(), span.clone()));

        let guard = self.shutdown.in_flight_guard();
        let metrics = Arc::clone(&self.metrics);
        let start = Instant::now();
        info!(parent: &span, "request started");
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let _guard = guard;
                let result = fut.await;
                let elapsed = start.elapsed();

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;

                let mut response = match result {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(error = %e, duration_ms, "request failed");
                        metrics.record_error();
                        return Err(e);
                    }
                };

                let status = response.status();
                info!(status_code = status.as_u16(), duration_ms, "request completed");
                if status.as_u16() >= 400 {
                    metrics.record_error();
                } else {
                    metrics.record_success(elapsed);
                }
                metrics::counter!("tailnet_mcp_http_requests_total", "status" => status.as_str().to_owned())
                    .increment(1);
                metrics::histogram!("tailnet_mcp_http_request_duration_seconds")
                    .record(elapsed.as_secs_f64());

                if let Ok(value) = HeaderValue::from_str(&request_id) {
                    response.headers_mut().insert(X_REQUEST_ID, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
