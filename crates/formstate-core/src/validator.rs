//! Validator adapter contract.
//!
//! The controller never evaluates rules itself. It calls an injected
//! [`Validator`] for single paths or for the whole document and reads the
//! resulting messages back. Any rule engine can sit behind this trait; the
//! default is [`NoopValidator`], which accepts everything.

use std::collections::BTreeMap;

use async_trait::async_trait;
use formstate_model::FieldPath;
use serde_json::Value;
use thiserror::Error;

/// Fault raised by a validator implementation (as opposed to a value simply
/// being invalid, which is reported through the error map).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    /// The adapter could not evaluate a rule.
    #[error("Validator failed on '{path}': {message}")]
    RuleFailed { path: String, message: String },

    /// The adapter is unavailable (e.g. a remote engine did not answer).
    #[error("Validator unavailable: {0}")]
    Unavailable(String),
}

impl ValidatorError {
    pub fn rule_failed(path: &FieldPath, message: impl Into<String>) -> Self {
        Self::RuleFailed {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Contract between the form controller and a validation engine.
///
/// `validate_path` receives the whole document so cross-field rules can look
/// at other values. Error lookups are synchronous and reflect the most recent
/// validation of each path.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Validate the whole document, replacing the error map. Returns whether
    /// the document is valid.
    async fn validate(&self, document: &Value) -> Result<bool, ValidatorError>;

    /// Validate one path in the context of the whole document.
    async fn validate_path(&self, path: &FieldPath, document: &Value)
    -> Result<bool, ValidatorError>;

    /// All current messages keyed by path.
    fn errors(&self) -> BTreeMap<String, Vec<String>>;

    /// Current messages for one path.
    fn errors_for_path(&self, path: &FieldPath) -> Vec<String>;

    /// Paths whose validity may change when `path` changes.
    fn dependent_fields(&self, path: &FieldPath) -> Vec<FieldPath>;

    fn clear_errors_for_path(&self, path: &FieldPath);

    fn reset(&self);
}

/// Validator that accepts every document and has no dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

#[async_trait]
impl Validator for NoopValidator {
    async fn validate(&self, _document: &Value) -> Result<bool, ValidatorError> {
        Ok(true)
    }

    async fn validate_path(
        &self,
        _path: &FieldPath,
        _document: &Value,
    ) -> Result<bool, ValidatorError> {
        Ok(true)
    }

    fn errors(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }

    fn errors_for_path(&self, _path: &FieldPath) -> Vec<String> {
        Vec::new()
    }

    fn dependent_fields(&self, _path: &FieldPath) -> Vec<FieldPath> {
        Vec::new()
    }

    fn clear_errors_for_path(&self, _path: &FieldPath) {}

    fn reset(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_accepts_everything() {
        let validator = NoopValidator;
        let path = FieldPath::parse("anything").unwrap();
        assert!(validator.validate(&Value::Null).await.unwrap());
        assert!(validator.validate_path(&path, &Value::Null).await.unwrap());
        assert!(validator.errors().is_empty());
        assert!(validator.dependent_fields(&path).is_empty());
    }
}
