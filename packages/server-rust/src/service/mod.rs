//! Tool execution.
//!
//! 1. **Operations** (`operation`): tool names, `ToolCall`, pipeline errors
//! 2. **Handlers** (`tools`): argument validation and one backend call per tool
//! 3. **Middleware** (`middleware`): Tower layers (timeout, metrics)

pub mod config;
pub mod middleware;
pub mod operation;
pub mod tools;

// Re-export key types for convenient access.
pub use config::ServiceConfig;
pub use middleware::{build_tool_pipeline, ToolPipeline};
pub use operation::{OperationError, ToolCall, ToolName, DEVICE_ID};
pub use tools::ToolHandlers;
