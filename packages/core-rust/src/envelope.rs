//! Uniform tool result returned for every operation.

use std::fmt::Display;

use serde::Serialize;

/// Outcome of a single tool invocation.
///
/// Exactly one text block is carried either way: the pretty-printed JSON
/// payload on success, or `"<context>: <cause>"` on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success { payload: String },
    Failure { message: String },
}

impl ToolResult {
    #[must_use]
    pub fn success(payload: impl Into<String>) -> Self {
        Self::Success {
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn failure(context: &str, cause: impl Display) -> Self {
        Self::Failure {
            message: format!("{context}: {cause}"),
        }
    }

    /// Render `value` as two-space indented JSON.
    ///
    /// A serialization error is reported as a failure under `context`
    /// instead of being propagated.
    pub fn from_serialized<T: Serialize + ?Sized>(value: &T, context: &str) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::success(text),
            Err(e) => Self::failure(context, e),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// The single text block of the envelope.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Success { payload } => payload,
            Self::Failure { message } => message,
        }
    }
}
