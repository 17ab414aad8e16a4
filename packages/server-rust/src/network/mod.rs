//! HTTP transport: configuration, middleware, handlers, and shutdown control.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::*;
pub use handlers::AppState;
pub use middleware::{build_mcp_layers, generate_request_id, RequestContextLayer};
pub use module::NetworkModule;
pub use shutdown::*;
