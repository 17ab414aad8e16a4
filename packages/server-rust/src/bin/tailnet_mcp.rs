//! `tailnet-mcp` binary: parses configuration, wires the backend client,
//! tool pipeline and HTTP transport, and serves until SIGINT/SIGTERM.

use std::sync::Arc;

use clap::Parser;
use tailnet_mcp_core::TailnetClient;
use tailnet_mcp_server::backend::{BackendConfig, HttpTailnetClient};
use tailnet_mcp_server::config::{AppConfig, ConfigArgs};
use tailnet_mcp_server::mcp::McpHandler;
use tailnet_mcp_server::metrics::Metrics;
use tailnet_mcp_server::network::NetworkModule;
use tailnet_mcp_server::service::{build_tool_pipeline, ToolHandlers};
use tailnet_mcp_server::telemetry::{init_tracing, install_prometheus, LogFormat};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "tailnet-mcp",
    version,
    about = "MCP server exposing read-only Tailscale tailnet queries"
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = match AppConfig::from_args(cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        tailnet = %config.tailnet,
        api_base_url = %config.api_base_url,
        tool_timeout_ms = config.service.default_call_timeout_ms,
        "configuration loaded"
    );

    if let Some(port) = config.prometheus_port {
        let addr = install_prometheus(port)?;
        info!(%addr, "prometheus exporter listening");
    }

    let client: Arc<dyn TailnetClient> =
        Arc::new(HttpTailnetClient::new(BackendConfig::from(&config))?);
    let metrics = Arc::new(Metrics::with_window(config.metrics_window));
    let pipeline = build_tool_pipeline(ToolHandlers::new(client));
    let mcp = Arc::new(McpHandler::new(pipeline, &config.service));

    let mut network = NetworkModule::new(config.network.clone(), metrics, mcp);
    let port = network.start().await?;
    info!(port, "tailnet-mcp listening, MCP endpoint at /mcp");

    network.serve(shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
