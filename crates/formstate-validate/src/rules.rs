//! Typed validation rules and the rule set that binds them to field patterns.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use formstate_core::access;
use formstate_model::{FieldPath, Segment};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RuleError};
use crate::pattern::PathPattern;

/// Deliberately loose: something, `@`, something, a dot, something.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex")
});

/// One check applied to a field value.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must not be null, blank, or an empty array/object.
    Required,
    /// Value must equal the value at another path.
    SameAs(PathPattern),
    /// Value must be greater than the value at another path (numbers, or
    /// strings compared lexically, which suits ISO dates).
    GreaterThan(PathPattern),
    /// Minimum length of a string (in characters) or array.
    MinLength(usize),
    /// Maximum length of a string (in characters) or array.
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Email,
    Matches(Regex),
    OneOf(Vec<Value>),
}

impl Rule {
    /// Compiles a `matches` rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidRegex`] if `regex` does not compile.
    pub fn matches(regex: &str) -> Result<Self> {
        Regex::new(regex)
            .map(Self::Matches)
            .map_err(|source| RuleError::InvalidRegex {
                regex: regex.to_string(),
                source,
            })
    }

    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] if `target` is not a path.
    pub fn same_as(target: &str) -> Result<Self> {
        Ok(Self::SameAs(parse_target(target)?))
    }

    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] if `target` is not a path.
    pub fn greater_than(target: &str) -> Result<Self> {
        Ok(Self::GreaterThan(parse_target(target)?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::SameAs(_) => "same_as",
            Self::GreaterThan(_) => "greater_than",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Email => "email",
            Self::Matches(_) => "matches",
            Self::OneOf(_) => "one_of",
        }
    }

    /// The other field this rule reads, if any.
    pub fn target(&self) -> Option<&PathPattern> {
        match self {
            Self::SameAs(target) | Self::GreaterThan(target) => Some(target),
            _ => None,
        }
    }

    /// Check `value`, found at a path whose wildcard captures are `captures`.
    /// Rules other than `required` accept empty values.
    pub fn check(&self, value: &Value, captures: &[Segment], document: &Value) -> Option<Violation> {
        if let Self::Required = self {
            return is_empty(value).then_some(Violation::Missing);
        }
        if is_empty(value) {
            return None;
        }
        match self {
            Self::Required => None,
            Self::SameAs(target) => {
                let (other_path, other) = resolve(target, captures, document);
                (value != &other).then(|| Violation::Mismatch {
                    other: label_of(&other_path),
                })
            }
            Self::GreaterThan(target) => {
                let (other_path, other) = resolve(target, captures, document);
                if is_empty(&other) {
                    return None;
                }
                let greater = match (as_number(value), as_number(&other)) {
                    (Some(a), Some(b)) => a > b,
                    _ => text_of(value) > text_of(&other),
                };
                (!greater).then(|| Violation::NotGreater {
                    other: label_of(&other_path),
                })
            }
            Self::MinLength(min) => {
                let len = length_of(value);
                (len < *min).then_some(Violation::TooShort { min: *min })
            }
            Self::MaxLength(max) => {
                let len = length_of(value);
                (len > *max).then_some(Violation::TooLong { max: *max })
            }
            Self::Min(min) => match as_number(value) {
                Some(number) => (number < *min).then_some(Violation::BelowMin { min: *min }),
                None => Some(Violation::NotANumber),
            },
            Self::Max(max) => match as_number(value) {
                Some(number) => (number > *max).then_some(Violation::AboveMax { max: *max }),
                None => Some(Violation::NotANumber),
            },
            Self::Email => (!EMAIL.is_match(&text_of(value))).then_some(Violation::InvalidEmail),
            Self::Matches(regex) => (!regex.is_match(&text_of(value))).then_some(Violation::InvalidFormat),
            Self::OneOf(allowed) => (!allowed.contains(value)).then(|| Violation::NotAllowed {
                allowed: allowed.iter().map(text_of).collect(),
            }),
        }
    }
}

/// Why a value failed a rule. Each variant carries only the data its message
/// needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    Missing,
    Mismatch { other: String },
    NotGreater { other: String },
    TooShort { min: usize },
    TooLong { max: usize },
    BelowMin { min: f64 },
    AboveMax { max: f64 },
    NotANumber,
    InvalidEmail,
    InvalidFormat,
    NotAllowed { allowed: Vec<String> },
}

impl Violation {
    /// Message for a field shown as `label`.
    pub fn message(&self, label: &str) -> String {
        match self {
            Violation::Missing => format!("{label} is required"),
            Violation::Mismatch { other } => format!("{label} must match {other}"),
            Violation::NotGreater { other } => format!("{label} must be greater than {other}"),
            Violation::TooShort { min } => format!("{label} must be at least {min} long"),
            Violation::TooLong { max } => format!("{label} must be at most {max} long"),
            Violation::BelowMin { min } => format!("{label} must be at least {min}"),
            Violation::AboveMax { max } => format!("{label} must be at most {max}"),
            Violation::NotANumber => format!("{label} must be a number"),
            Violation::InvalidEmail => format!("{label} must be a valid email address"),
            Violation::InvalidFormat => format!("{label} has an invalid format"),
            Violation::NotAllowed { allowed } => {
                format!("{label} must be one of: {}", allowed.join(", "))
            }
        }
    }
}

/// Serializable form of a [`Rule`], as found in rule set JSON:
/// `"required"`, `{"min_length": 3}`, `{"same_as": "password"}`.
///
/// Cross-field targets may be written with a leading `@`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleDef {
    Required,
    SameAs(String),
    GreaterThan(String),
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Email,
    Matches(String),
    OneOf(Vec<Value>),
}

impl TryFrom<RuleDef> for Rule {
    type Error = RuleError;

    fn try_from(def: RuleDef) -> Result<Self> {
        Ok(match def {
            RuleDef::Required => Rule::Required,
            RuleDef::SameAs(target) => Rule::same_as(&target)?,
            RuleDef::GreaterThan(target) => Rule::greater_than(&target)?,
            RuleDef::MinLength(min) => Rule::MinLength(min),
            RuleDef::MaxLength(max) => Rule::MaxLength(max),
            RuleDef::Min(min) => Rule::Min(min),
            RuleDef::Max(max) => Rule::Max(max),
            RuleDef::Email => Rule::Email,
            RuleDef::Matches(regex) => Rule::matches(&regex)?,
            RuleDef::OneOf(values) => Rule::OneOf(values),
        })
    }
}

/// Rules bound to field patterns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<RuleDef>>")]
pub struct RuleSet {
    entries: Vec<(PathPattern, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `rule` for fields matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] if `pattern` is malformed.
    pub fn rule(mut self, pattern: &str, rule: Rule) -> Result<Self> {
        let pattern = PathPattern::parse(pattern)?;
        match self.entries.iter_mut().find(|(existing, _)| *existing == pattern) {
            Some((_, rules)) => rules.push(rule),
            None => self.entries.push((pattern, vec![rule])),
        }
        Ok(self)
    }

    /// Parse a JSON object mapping patterns to rule lists.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, patterns or regexes.
    pub fn from_json(text: &str) -> Result<Self> {
        let defs: BTreeMap<String, Vec<RuleDef>> = serde_json::from_str(text)?;
        Self::try_from(defs)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &PathPattern> {
        self.entries.iter().map(|(pattern, _)| pattern)
    }

    /// Rules that apply to `path`, with the wildcard captures of the matching
    /// pattern.
    pub fn rules_for(&self, path: &FieldPath) -> Vec<(&Rule, Vec<Segment>)> {
        self.entries
            .iter()
            .filter_map(|(pattern, rules)| pattern.captures(path).map(|captures| (rules, captures)))
            .flat_map(|(rules, captures)| rules.iter().map(move |rule| (rule, captures.clone())))
            .collect()
    }

    /// Every concrete path some pattern describes in `document`.
    pub fn concrete_paths(&self, document: &Value) -> Vec<FieldPath> {
        let mut paths: Vec<FieldPath> = self
            .entries
            .iter()
            .flat_map(|(pattern, _)| pattern.expand(document))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Fields whose rules read `path` through a cross-field target.
    pub fn dependents_of(&self, path: &FieldPath) -> Vec<FieldPath> {
        let mut dependents = Vec::new();
        for (pattern, rules) in &self.entries {
            for target in rules.iter().filter_map(Rule::target) {
                let Some(captures) = target.captures(path) else {
                    continue;
                };
                match pattern.substitute(&captures) {
                    Some(dependent) if !dependents.contains(&dependent) => dependents.push(dependent),
                    Some(_) => {}
                    None => tracing::debug!(
                        pattern = %pattern,
                        target = %target,
                        "dependent pattern has wildcards the target does not bind"
                    ),
                }
            }
        }
        dependents
    }
}

impl TryFrom<BTreeMap<String, Vec<RuleDef>>> for RuleSet {
    type Error = RuleError;

    fn try_from(defs: BTreeMap<String, Vec<RuleDef>>) -> Result<Self> {
        let mut entries = Vec::with_capacity(defs.len());
        for (pattern, rules) in defs {
            let pattern = PathPattern::parse(&pattern)?;
            let rules = rules
                .into_iter()
                .map(Rule::try_from)
                .collect::<Result<Vec<_>>>()?;
            entries.push((pattern, rules));
        }
        Ok(Self { entries })
    }
}

fn parse_target(target: &str) -> Result<PathPattern> {
    PathPattern::parse(target.strip_prefix('@').unwrap_or(target))
}

fn resolve(target: &PathPattern, captures: &[Segment], document: &Value) -> (Option<FieldPath>, Value) {
    let path = target.substitute(captures);
    let value = path
        .as_ref()
        .and_then(|path| access::get(document, path))
        .cloned()
        .unwrap_or(Value::Null);
    (path, value)
}

fn label_of(path: &Option<FieldPath>) -> String {
    path.as_ref()
        .and_then(FieldPath::label)
        .unwrap_or("the other field")
        .to_string()
}

pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn length_of(value: &Value) -> usize {
    match value {
        Value::String(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => text_of(other).chars().count(),
    }
}
