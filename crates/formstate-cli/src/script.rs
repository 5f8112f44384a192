//! Session scripts: an initial document plus the steps a user would take.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use formstate_core::{ControllerConfig, FieldPath, access};
use formstate_validate::RuleSet;
use serde::Deserialize;
use serde_json::Value;

/// A scripted form session.
///
/// ```json
/// {
///   "document": {"email": ""},
///   "rules": {"email": ["required", "email"]},
///   "config": {"debounce_ms": 0},
///   "steps": [
///     {"op": "register", "path": "email"},
///     {"op": "set", "address": "email", "value": "a@b.co"},
///     {"op": "submit"}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub document: Value,
    #[serde(default)]
    pub rules: Option<RuleSet>,
    #[serde(default)]
    pub config: ControllerConfig,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parse script {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// One user action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Register {
        path: String,
    },
    /// Write a value (`email`) or a metadata attribute (`email.$errors`).
    Set {
        address: String,
        value: Value,
    },
    Focus {
        path: String,
    },
    Blur {
        path: String,
    },
    /// Insert `item`; appends when `index` is omitted.
    Add {
        path: String,
        #[serde(default)]
        index: Option<usize>,
        item: Value,
    },
    Remove {
        path: String,
        index: usize,
    },
    Move {
        path: String,
        from: usize,
        to: usize,
    },
    /// Sort by the value at `key` inside each element, or by the elements
    /// themselves.
    Sort {
        path: String,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        descending: bool,
    },
    Validate,
    ValidateField {
        path: String,
    },
    Submit,
    Reset,
    /// Wait for pending debounced validations.
    Settle,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Set { .. } => "set",
            Self::Focus { .. } => "focus",
            Self::Blur { .. } => "blur",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Move { .. } => "move",
            Self::Sort { .. } => "sort",
            Self::Validate => "validate",
            Self::ValidateField { .. } => "validate_field",
            Self::Submit => "submit",
            Self::Reset => "reset",
            Self::Settle => "settle",
        }
    }
}

/// Comparator for `sort` steps.
#[derive(Debug, Clone)]
pub struct SortKey {
    key: Option<FieldPath>,
    descending: bool,
}

impl SortKey {
    pub fn new(key: Option<&str>, descending: bool) -> Result<Self> {
        let key = key
            .map(FieldPath::parse)
            .transpose()
            .context("parse sort key")?;
        Ok(Self { key, descending })
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = compare_values(self.pick(a), self.pick(b));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }

    fn pick<'a>(&self, item: &'a Value) -> &'a Value {
        match &self.key {
            Some(key) => access::get(item, key).unwrap_or(&Value::Null),
            None => item,
        }
    }
}

/// Total order over JSON values: null, booleans, numbers, strings, then
/// containers by their serialized text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
