//! Tower middleware layers for the tool pipeline.
//!
//! - [`timeout`]: Per-call timeout enforcement
//! - [`metrics`]: Call timing and counting via `tracing` spans and the `metrics` facade
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use metrics::MetricsLayer;
pub use pipeline::{build_tool_pipeline, ToolPipeline};
pub use timeout::TimeoutLayer;
