//! HTTP handler definitions.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod health;
pub mod mcp;
pub mod metrics;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use mcp::mcp_handler;
pub use metrics::metrics_handler;

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::mcp::McpHandler;
use crate::metrics::Metrics;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
    /// Request counters fed by the HTTP middleware.
    pub metrics: Arc<Metrics>,
    /// JSON-RPC dispatcher for `POST /mcp`.
    pub mcp: Arc<McpHandler>,
}
