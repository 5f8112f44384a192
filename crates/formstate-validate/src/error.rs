//! Rule set construction errors.

use formstate_model::FormError;
use thiserror::Error;

/// Error raised while building a [`crate::RuleSet`].
#[derive(Debug, Error)]
pub enum RuleError {
    /// A field pattern or rule target is not a valid path.
    #[error("Invalid path pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: FormError,
    },

    /// A `matches` rule carried a regex that does not compile.
    #[error("Invalid regex '{regex}': {source}")]
    InvalidRegex {
        regex: String,
        #[source]
        source: regex::Error,
    },

    /// The rule set JSON could not be parsed.
    #[error("Failed to parse rule set: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RuleError {
    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPattern { .. } => {
                Some("Patterns are dot-paths; use '*' for any key or index, e.g. 'items.*.name'.")
            }
            Self::InvalidRegex { .. } => Some("Check the regex syntax; patterns use the regex crate dialect."),
            Self::Parse(_) => Some("Rule sets map field patterns to lists such as [\"required\", {\"min_length\": 3}]."),
        }
    }
}

/// Result type for rule set construction.
pub type Result<T> = std::result::Result<T, RuleError>;
