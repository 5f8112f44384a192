//! Controller behavior configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for when and how fields are validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Validate a registered field after its value is written.
    pub validate_on_input: bool,

    /// Validate a field when it loses focus.
    pub validate_on_blur: bool,

    /// Debounce window for input-triggered validation, in milliseconds.
    ///
    /// Writes to the same field within the window collapse into one
    /// validation that runs after the last write.
    pub debounce_ms: u64,

    /// After an input-triggered validation, revalidate touched fields that
    /// depend on the written one.
    pub revalidate_dependents: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            validate_on_input: true,
            validate_on_blur: true,
            debounce_ms: 300,
            revalidate_dependents: true,
        }
    }
}

impl ControllerConfig {
    /// A config that never validates on its own; only explicit
    /// `validate`/`validate_field`/`submit` calls run the validator.
    pub fn manual() -> Self {
        Self {
            validate_on_input: false,
            validate_on_blur: false,
            ..Default::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
