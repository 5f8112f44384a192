//! Model error types.
//!
//! Everything reported here is a programming error on the caller's side
//! (malformed addresses, wrong metadata types, unusable documents). Recoverable
//! conditions such as failed validation never surface as `FormError`.

use thiserror::Error;

use crate::field::MetaKey;

/// Error raised when a path, address or document cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FormError {
    /// The path string was empty.
    #[error("Path must not be empty")]
    EmptyPath,

    /// The path contained an empty segment (e.g. `a..b` or a trailing dot).
    #[error("Path '{path}' contains an empty segment")]
    EmptySegment {
        /// The offending path text.
        path: String,
    },

    /// A `$name` suffix did not name a known metadata attribute.
    #[error("Unknown metadata attribute '${name}'")]
    UnknownMeta {
        /// The name after the `$`.
        name: String,
    },

    /// A metadata write carried a value of the wrong type for its key.
    #[error("Metadata '{key}' expects {expected}")]
    MetaTypeMismatch {
        /// The metadata key being written.
        key: MetaKey,
        /// Description of the expected value.
        expected: &'static str,
    },

    /// The document root is not an object or an array.
    #[error("Form document must be an object or an array, got {found}")]
    InvalidDocument {
        /// JSON type name of the rejected root.
        found: &'static str,
    },
}

impl FormError {
    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::EmptyPath | Self::EmptySegment { .. } => {
                Some("Use dot-separated segments such as 'items.0.price'.")
            }
            Self::UnknownMeta { .. } => {
                Some("Valid metadata names are $errors, $isDirty, $isTouched and $isValidating.")
            }
            Self::MetaTypeMismatch { .. } => {
                Some("$errors takes a list of strings; the other attributes take booleans.")
            }
            Self::InvalidDocument { .. } => Some("Wrap scalar values in an object."),
        }
    }
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, FormError>;

/// JSON type name used in error messages.
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
