//! Implementations of the backend capability traits.
//!
//! - [`http`]: production client for the management REST API
//! - [`memory`]: fixture-backed client for tests

pub mod http;
pub mod memory;

pub use http::{ApiError, BackendConfig, HttpTailnetClient};
pub use memory::MemoryTailnet;
