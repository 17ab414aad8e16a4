//! Network module with deferred startup lifecycle.
//!
//! `new()` creates shared resources, `start()` binds the TCP listener, and
//! `serve()` accepts connections until shutdown, then drains within the
//! configured grace period.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::bail;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, mcp_handler, metrics_handler, readiness_handler, AppState,
};
use super::middleware::{build_cors_layer, build_mcp_layers};
use super::shutdown::ShutdownController;
use crate::mcp::McpHandler;
use crate::metrics::Metrics;

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- allocates shared state (shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    metrics: Arc<Metrics>,
    mcp: Arc<McpHandler>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, metrics: Arc<Metrics>, mcp: Arc<McpHandler>) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            metrics,
            mcp,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /mcp` -- JSON-RPC (MCP), behind the correlation and timeout layers
    /// - `GET /metrics` -- request counters
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    ///
    /// Only `/mcp` traffic is counted into [`Metrics`].
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
            metrics: Arc::clone(&self.metrics),
            mcp: Arc::clone(&self.mcp),
        };

        let mcp_layers = build_mcp_layers(
            &self.config,
            Arc::clone(&self.metrics),
            Arc::clone(&self.shutdown),
        );
        let mcp_routes = Router::new()
            .route("/mcp", post(mcp_handler))
            .route_layer(mcp_layers);

        Router::new()
            .merge(mcp_routes)
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(build_cors_layer(&self.config.cors_origins))
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured
    /// port when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then drains.
    ///
    /// After the signal the health state moves to Draining, the listener
    /// stops accepting, and in-flight requests get up to
    /// `shutdown_grace` to finish. After that `serve()` returns without
    /// waiting further, and whatever is still running ends with the
    /// runtime. The state ends at Stopped either way.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let Some(listener) = self.listener else {
            bail!("start() must be called before serve()");
        };
        let controller = self.shutdown;
        let grace = self.config.shutdown_grace;

        let mut drain = controller.drain_receiver();
        let signal_ctrl = Arc::clone(&controller);
        let graceful = async move {
            shutdown.await;
            signal_ctrl.begin_drain();
        };

        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(graceful);
        let mut task = tokio::spawn(async move { server.await });

        controller.set_ready();
        info!("serving HTTP connections");

        let result = tokio::select! {
            joined = &mut task => server_outcome(joined),
            _ = drain.changed() => {
                info!(
                    grace_secs = grace.as_secs(),
                    in_flight = controller.in_flight_count(),
                    "shutdown signal received, draining"
                );
                match tokio::time::timeout(grace, &mut task).await {
                    Ok(joined) => server_outcome(joined),
                    Err(_elapsed) => {
                        warn!(
                            in_flight = controller.in_flight_count(),
                            "drain grace period expired, abandoning remaining requests"
                        );
                        task.abort();
                        Ok(())
                    }
                }
            }
        };

        controller.mark_stopped();
        result
    }
}

fn server_outcome(joined: Result<std::io::Result<()>, JoinError>) -> anyhow::Result<()> {
    Ok(joined??)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tailnet_mcp_core::{Device, TailnetClient};
    use tower::ServiceExt;

    use super::*;
    use crate::backend::MemoryTailnet;
    use crate::network::HealthState;
    use crate::service::{build_tool_pipeline, ServiceConfig, ToolHandlers};

    fn module_with(tailnet: Arc<MemoryTailnet>, config: NetworkConfig) -> NetworkModule {
        let client: Arc<dyn TailnetClient> = tailnet;
        let pipeline = build_tool_pipeline(ToolHandlers::new(client));
        let mcp = Arc::new(McpHandler::new(pipeline, &ServiceConfig::default()));
        NetworkModule::new(config, Arc::new(Metrics::new()), mcp)
    }

    fn module(tailnet: Arc<MemoryTailnet>) -> NetworkModule {
        module_with(tailnet, NetworkConfig::default())
    }

    fn rpc(body: &str) -> Request<Body> {
        Request::post("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = module(Arc::new(MemoryTailnet::new()));
        assert!(module.listener.is_none());
        assert_eq!(
            module.shutdown_controller().health_state(),
            HealthState::Starting
        );
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module(Arc::new(MemoryTailnet::new()));
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let module = module(Arc::new(MemoryTailnet::new()));
        let err = module.serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start() must be called"));
    }

    #[tokio::test]
    async fn tools_call_over_http() {
        let tailnet = Arc::new(MemoryTailnet::new().with_devices(vec![Device {
            id: "device1".to_string(),
            name: "test-device-1".to_string(),
            ..Device::default()
        }]));
        let module = module(Arc::clone(&tailnet));
        let metrics = Arc::clone(&module.metrics);

        let response = module
            .build_router()
            .oneshot(rpc(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"list_devices","arguments":{}}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = json_body(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["isError"], false);
        assert!(body["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("test-device-1"));
        assert_eq!(metrics.snapshot().request_count, 1);
    }

    #[tokio::test]
    async fn tool_failure_is_http_200_and_counts_as_success() {
        let module = module(Arc::new(MemoryTailnet::new()));
        let metrics = Arc::clone(&module.metrics);

        let response = module
            .build_router()
            .oneshot(rpc(
                r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"get_device_routes","arguments":{"deviceID":"ab"}}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], "a");
        assert_eq!(body["result"]["isError"], true);
        let snapshot = metrics.snapshot();
        assert_eq!((snapshot.request_count, snapshot.error_count), (1, 0));
    }

    #[tokio::test]
    async fn malformed_body_is_400_parse_error() {
        let module = module(Arc::new(MemoryTailnet::new()));
        let metrics = Arc::clone(&module.metrics);

        let response = module.build_router().oneshot(rpc("{oops")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
        assert_eq!(metrics.snapshot().error_count, 1);
    }

    #[tokio::test]
    async fn initialized_notification_is_202() {
        let module = module(Arc::new(MemoryTailnet::new()));
        let response = module
            .build_router()
            .oneshot(rpc(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_counters() {
        let module = module(Arc::new(MemoryTailnet::new()));
        let router = module.build_router();

        let _ = router
            .clone()
            .oneshot(rpc(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .unwrap();
        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["request_count"], 1);
        assert_eq!(body["error_count"], 0);
        assert!(body["last_request_time"].is_string());
        assert!(body.get("average_request_ms").is_some());
    }

    #[tokio::test]
    async fn probes_and_scrapes_are_not_counted() {
        let module = module(Arc::new(MemoryTailnet::new()));
        let metrics = Arc::clone(&module.metrics);
        let router = module.build_router();

        for path in ["/health", "/health/live", "/health/ready", "/metrics"] {
            let response = router
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert!(!response.headers().contains_key("x-request-id"), "{path}");
        }

        let snapshot = metrics.snapshot();
        assert_eq!((snapshot.request_count, snapshot.error_count), (0, 0));
        assert!(snapshot.last_request_time.is_none());
    }

    #[tokio::test]
    async fn serve_drains_and_stops_on_signal() {
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            shutdown_grace: Duration::from_secs(1),
            ..NetworkConfig::default()
        };
        let mut module = module_with(Arc::new(MemoryTailnet::new()), config);
        let port = module.start().await.unwrap();
        let controller = module.shutdown_controller();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = rx.await;
        }));

        let url = format!("http://127.0.0.1:{port}/health/ready");
        let mut ready = false;
        for _ in 0..50 {
            if let Ok(resp) = reqwest::get(&url).await {
                ready = resp.status() == reqwest::StatusCode::OK;
                if ready {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ready);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn serve_returns_once_the_grace_period_expires() {
        let tailnet = Arc::new(MemoryTailnet::new());
        tailnet.policy_file.delay_by(Duration::from_secs(10));
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            shutdown_grace: Duration::from_millis(100),
            ..NetworkConfig::default()
        };
        let mut module = module_with(Arc::clone(&tailnet), config);
        let port = module.start().await.unwrap();
        let controller = module.shutdown_controller();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = rx.await;
        }));

        let url = format!("http://127.0.0.1:{port}/mcp");
        let slow = tokio::spawn(async move {
            reqwest::Client::new()
                .post(url)
                .json(&json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"get_acl"}}))
                .send()
                .await
        });

        while tailnet.policy_file.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(controller.in_flight_count(), 1);

        let started = std::time::Instant::now();
        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(controller.health_state(), HealthState::Stopped);
        assert_eq!(controller.in_flight_count(), 1);
        slow.abort();
    }
}
