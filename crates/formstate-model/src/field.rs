//! Per-field metadata.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FormError, Result};

/// Stable identity of a field record.
///
/// Generated once when the record is created and never changed by array
/// reindexing, so UI state bound to it survives moves and sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(Uuid);

impl FieldId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex digits, for compact display.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata attribute addressable with a `$name` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaKey {
    #[serde(rename = "errors")]
    Errors,
    #[serde(rename = "isDirty")]
    IsDirty,
    #[serde(rename = "isTouched")]
    IsTouched,
    #[serde(rename = "isValidating")]
    IsValidating,
}

impl MetaKey {
    pub const ALL: [MetaKey; 4] = [
        Self::Errors,
        Self::IsDirty,
        Self::IsTouched,
        Self::IsValidating,
    ];

    /// Parse the name after `$`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownMeta`] for names outside [`MetaKey::ALL`].
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "errors" => Ok(Self::Errors),
            "isDirty" => Ok(Self::IsDirty),
            "isTouched" => Ok(Self::IsTouched),
            "isValidating" => Ok(Self::IsValidating),
            other => Err(FormError::UnknownMeta {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Errors => "errors",
            Self::IsDirty => "isDirty",
            Self::IsTouched => "isTouched",
            Self::IsValidating => "isValidating",
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name())
    }
}

/// Value of one metadata attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Errors(Vec<String>),
    Flag(bool),
}

impl MetaValue {
    /// Convert a JSON value into the shape `key` expects.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::MetaTypeMismatch`] when the JSON has the wrong type.
    pub fn from_json(key: MetaKey, value: &serde_json::Value) -> Result<Self> {
        match key {
            MetaKey::Errors => {
                let mismatch = || FormError::MetaTypeMismatch {
                    key,
                    expected: "a list of strings",
                };
                let items = value.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
                    .collect::<Result<Vec<_>>>()
                    .map(Self::Errors)
            }
            _ => value
                .as_bool()
                .map(Self::Flag)
                .ok_or(FormError::MetaTypeMismatch {
                    key,
                    expected: "a boolean",
                }),
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Errors(_) => None,
        }
    }

    pub fn as_errors(&self) -> Option<&[String]> {
        match self {
            Self::Errors(errors) => Some(errors),
            Self::Flag(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Errors(errors) => serde_json::Value::from(errors.clone()),
            Self::Flag(flag) => serde_json::Value::Bool(*flag),
        }
    }
}

/// Metadata record for one registered field.
///
/// Equality ignores the internal validation generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    pub id: FieldId,
    /// Current validation messages; empty means valid.
    pub errors: Vec<String>,
    /// Value changed since the last reset.
    #[serde(rename = "isDirty")]
    pub dirty: bool,
    /// User interacted with (or blurred) the field.
    #[serde(rename = "isTouched")]
    pub touched: bool,
    /// A validation is in flight.
    #[serde(rename = "isValidating")]
    pub validating: bool,
    /// Bumped whenever a validation starts or the record is reset; results
    /// carrying an older generation are discarded.
    #[serde(skip)]
    generation: u64,
}

impl PartialEq for FieldState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.errors == other.errors
            && self.dirty == other.dirty
            && self.touched == other.touched
            && self.validating == other.validating
    }
}

impl Eq for FieldState {}

impl Default for FieldState {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldState {
    pub fn new() -> Self {
        Self {
            id: FieldId::new(),
            errors: Vec::new(),
            dirty: false,
            touched: false,
            validating: false,
            generation: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate any in-flight validation and return the new generation.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Read one attribute.
    pub fn meta(&self, key: MetaKey) -> MetaValue {
        match key {
            MetaKey::Errors => MetaValue::Errors(self.errors.clone()),
            MetaKey::IsDirty => MetaValue::Flag(self.dirty),
            MetaKey::IsTouched => MetaValue::Flag(self.touched),
            MetaKey::IsValidating => MetaValue::Flag(self.validating),
        }
    }

    /// Write one attribute, returning whether it changed.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::MetaTypeMismatch`] when `value` has the wrong shape.
    pub fn set_meta(&mut self, key: MetaKey, value: MetaValue) -> Result<bool> {
        match (key, value) {
            (MetaKey::Errors, MetaValue::Errors(errors)) => {
                let changed = self.errors != errors;
                self.errors = errors;
                Ok(changed)
            }
            (MetaKey::Errors, MetaValue::Flag(_)) => Err(FormError::MetaTypeMismatch {
                key,
                expected: "a list of strings",
            }),
            (_, MetaValue::Errors(_)) => Err(FormError::MetaTypeMismatch {
                key,
                expected: "a boolean",
            }),
            (key, MetaValue::Flag(flag)) => {
                let slot = match key {
                    MetaKey::IsDirty => &mut self.dirty,
                    MetaKey::IsTouched => &mut self.touched,
                    _ => &mut self.validating,
                };
                let changed = *slot != flag;
                *slot = flag;
                Ok(changed)
            }
        }
    }

    /// Clear errors and flags, keeping the identity. In-flight validations
    /// are invalidated.
    pub fn clear(&mut self) {
        self.errors.clear();
        self.dirty = false;
        self.touched = false;
        self.validating = false;
        self.generation += 1;
    }
}
