//! Argument extraction and identifier checks applied before any backend call.

use serde_json::{Map, Value};

/// Shortest identifier accepted by [`validate_identifier`].
pub const MIN_IDENTIFIER_LEN: usize = 3;

/// Longest identifier accepted by [`validate_identifier`].
pub const MAX_IDENTIFIER_LEN: usize = 50;

/// Characters that are never allowed inside an identifier.
pub const FORBIDDEN_WHITESPACE: [char; 4] = [' ', '\t', '\n', '\r'];

/// Tool arguments as delivered by the transport.
pub type Arguments = Map<String, Value>;

/// Rejections produced while checking tool arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{key} parameter is required")]
    MissingParameter { key: String },
    #[error("{key} parameter must be a string")]
    WrongType { key: String },
    #[error("{0}")]
    InvalidFormat(String),
    #[error("unexpected argument: {key}")]
    UnexpectedArgument { key: String },
}

/// Extract a string argument.
///
/// # Errors
///
/// `MissingParameter` when `key` is absent, `WrongType` when the value is
/// present but not a JSON string.
pub fn require_string<'a>(args: &'a Arguments, key: &str) -> Result<&'a str, ValidationError> {
    match args.get(key) {
        None => Err(ValidationError::MissingParameter {
            key: key.to_string(),
        }),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ValidationError::WrongType {
            key: key.to_string(),
        }),
    }
}

/// Check that an identifier is well formed.
///
/// Length is checked before content, so a 2- or 51-character input always
/// reports the length problem even if it also contains whitespace.
///
/// # Errors
///
/// `InvalidFormat` when the identifier is empty, shorter than
/// [`MIN_IDENTIFIER_LEN`], longer than [`MAX_IDENTIFIER_LEN`], or contains
/// a space, tab, newline or carriage return.
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::InvalidFormat(
            "device ID cannot be empty".to_string(),
        ));
    }

    let len = id.chars().count();
    if !(MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN).contains(&len) {
        return Err(ValidationError::InvalidFormat(format!(
            "device ID length should be between {MIN_IDENTIFIER_LEN} and {MAX_IDENTIFIER_LEN} characters"
        )));
    }

    if contains_forbidden_whitespace(id) {
        return Err(ValidationError::InvalidFormat(
            "device ID contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Returns `true` if `s` contains any of [`FORBIDDEN_WHITESPACE`].
#[must_use]
pub fn contains_forbidden_whitespace(s: &str) -> bool {
    s.contains(FORBIDDEN_WHITESPACE)
}

/// Reject any argument whose name is not in `allowed`.
///
/// # Errors
///
/// `UnexpectedArgument` naming the first unknown key, in key order.
pub fn reject_unknown_arguments(args: &Arguments, allowed: &[&str]) -> Result<(), ValidationError> {
    match args.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(ValidationError::UnexpectedArgument { key: key.clone() }),
        None => Ok(()),
    }
}
