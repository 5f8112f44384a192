//! [`Validator`] implementation backed by a [`RuleSet`].

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use formstate_core::{Validator, ValidatorError, access};
use formstate_model::FieldPath;
use serde_json::Value;
use tracing::{debug, trace};

use crate::rules::RuleSet;

/// Evaluates a [`RuleSet`] synchronously and keeps the latest messages per
/// path.
#[derive(Debug, Default)]
pub struct RuleValidator {
    rules: RuleSet,
    errors: Mutex<BTreeMap<String, Vec<String>>>,
}

impl RuleValidator {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            errors: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<String>>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Messages for every rule `path` fails, in rule order.
    pub fn check_path(&self, path: &FieldPath, document: &Value) -> Vec<String> {
        let value = access::get(document, path).unwrap_or(&Value::Null);
        let label = path.label().unwrap_or("value");
        self.rules
            .rules_for(path)
            .into_iter()
            .filter_map(|(rule, captures)| {
                let violation = rule.check(value, &captures, document)?;
                trace!(path = %path, rule = rule.name(), "rule failed");
                Some(violation.message(label))
            })
            .collect()
    }

    fn store(&self, path: &FieldPath, messages: Vec<String>) -> bool {
        let mut errors = self.lock();
        if messages.is_empty() {
            errors.remove(&path.to_string());
            true
        } else {
            errors.insert(path.to_string(), messages);
            false
        }
    }
}

#[async_trait]
impl Validator for RuleValidator {
    async fn validate(&self, document: &Value) -> Result<bool, ValidatorError> {
        let paths = self.rules.concrete_paths(document);
        let found: BTreeMap<String, Vec<String>> = paths
            .iter()
            .map(|path| (path.to_string(), self.check_path(path, document)))
            .filter(|(_, messages)| !messages.is_empty())
            .collect();
        debug!(checked = paths.len(), invalid = found.len(), "document validated");
        let valid = found.is_empty();
        *self.lock() = found;
        Ok(valid)
    }

    async fn validate_path(&self, path: &FieldPath, document: &Value) -> Result<bool, ValidatorError> {
        let messages = self.check_path(path, document);
        Ok(self.store(path, messages))
    }

    fn errors(&self) -> BTreeMap<String, Vec<String>> {
        self.lock().clone()
    }

    fn errors_for_path(&self, path: &FieldPath) -> Vec<String> {
        self.lock()
            .get(&path.to_string())
            .cloned()
            .unwrap_or_default()
    }

    fn dependent_fields(&self, path: &FieldPath) -> Vec<FieldPath> {
        self.rules.dependents_of(path)
    }

    fn clear_errors_for_path(&self, path: &FieldPath) {
        self.lock().remove(&path.to_string());
    }

    fn reset(&self) {
        self.lock().clear();
    }
}
