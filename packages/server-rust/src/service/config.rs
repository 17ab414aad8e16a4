/// Configuration for the tool-call pipeline.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deadline applied to every tool call, in milliseconds.
    pub default_call_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_call_timeout_ms: 25_000,
        }
    }
}
