//! Form-wide aggregate state.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one controller instance, carried on every event so listeners
/// on a shared bus can tell forms apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(Uuid);

impl FormId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FormId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate flags for a whole form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    /// A submit is in progress.
    pub submitting: bool,
    /// Number of validations in flight.
    pub validating: usize,
    /// Any value was written since the last reset.
    pub dirty: bool,
    /// Any field was touched since the last reset.
    pub touched: bool,
    /// Bumped on every observable mutation.
    pub version: u64,
}

impl FormState {
    #[inline]
    pub fn is_validating(&self) -> bool {
        self.validating > 0
    }

    /// Record an observable mutation.
    pub fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn begin_validation(&mut self) {
        self.validating += 1;
    }

    pub fn end_validation(&mut self) {
        self.validating = self.validating.saturating_sub(1);
    }
}
