//! Field path patterns with `*` wildcards.
//!
//! `items.*.price` matches `items.0.price`, `items.17.price` and so on. The
//! segments a wildcard matched are captured in order, and can be substituted
//! into another pattern; that is how a rule on `items.*.confirm` finds its
//! `items.*.password` partner in the same element.

use std::fmt;

use formstate_core::access;
use formstate_model::{FieldPath, Segment};
use serde_json::Value;

use crate::error::{Result, RuleError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Any,
    Exact(Segment),
}

/// A dot-path where `*` segments match any single key or index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    parts: Vec<Part>,
}

impl PathPattern {
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] for empty patterns or segments.
    pub fn parse(text: &str) -> Result<Self> {
        let path = FieldPath::parse(text).map_err(|source| RuleError::InvalidPattern {
            pattern: text.to_string(),
            source,
        })?;
        let parts = path
            .segments()
            .iter()
            .map(|segment| match segment {
                Segment::Key(key) if key == "*" => Part::Any,
                other => Part::Exact(other.clone()),
            })
            .collect();
        Ok(Self { parts })
    }

    pub fn has_wildcards(&self) -> bool {
        self.parts.iter().any(|part| *part == Part::Any)
    }

    /// The segments matched by each wildcard, or `None` if `path` does not
    /// match.
    pub fn captures(&self, path: &FieldPath) -> Option<Vec<Segment>> {
        if self.parts.len() != path.len() {
            return None;
        }
        let mut captured = Vec::new();
        for (part, segment) in self.parts.iter().zip(path.segments()) {
            match part {
                Part::Any => captured.push(segment.clone()),
                Part::Exact(expected) if expected == segment => {}
                Part::Exact(_) => return None,
            }
        }
        Some(captured)
    }

    pub fn matches(&self, path: &FieldPath) -> bool {
        self.captures(path).is_some()
    }

    /// Fill the wildcards with `captures`, in order. `None` when there are
    /// fewer captures than wildcards.
    pub fn substitute(&self, captures: &[Segment]) -> Option<FieldPath> {
        let mut remaining = captures.iter();
        let segments = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Any => remaining.next().cloned(),
                Part::Exact(segment) => Some(segment.clone()),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(FieldPath::from_segments(segments))
    }

    /// Every concrete path in `document` this pattern describes. Wildcards
    /// expand over the array indices or object keys present; exact segments
    /// are kept even when nothing is stored there, so missing required values
    /// are still found.
    pub fn expand(&self, document: &Value) -> Vec<FieldPath> {
        let mut paths = vec![FieldPath::root()];
        for part in &self.parts {
            paths = match part {
                Part::Exact(segment) => paths
                    .into_iter()
                    .map(|path| FieldPath::from_segments(extend(&path, segment.clone())))
                    .collect(),
                Part::Any => paths
                    .into_iter()
                    .flat_map(|path| children(document, &path))
                    .collect(),
            };
        }
        paths
    }
}

fn extend(path: &FieldPath, segment: Segment) -> Vec<Segment> {
    let mut segments = path.segments().to_vec();
    segments.push(segment);
    segments
}

fn children(document: &Value, path: &FieldPath) -> Vec<FieldPath> {
    match access::get(document, path) {
        Some(Value::Array(items)) => (0..items.len()).map(|i| path.index(i)).collect(),
        Some(Value::Object(map)) => map.keys().map(|key| path.key(key.as_str())).collect(),
        _ => Vec::new(),
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match part {
                Part::Any => f.write_str("*")?,
                Part::Exact(segment) => write!(f, "{segment}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).unwrap()
    }

    #[test]
    fn wildcard_captures_index() {
        let pattern = PathPattern::parse("items.*.price").unwrap();
        assert_eq!(
            pattern.captures(&path("items.4.price")),
            Some(vec![Segment::Index(4)])
        );
        assert!(!pattern.matches(&path("items.4.name")));
        assert!(!pattern.matches(&path("items.4")));
    }

    #[test]
    fn substitute_fills_in_order() {
        let pattern = PathPattern::parse("a.*.b.*").unwrap();
        let filled = pattern
            .substitute(&[Segment::Index(1), Segment::Key("x".into())])
            .unwrap();
        assert_eq!(filled.to_string(), "a.1.b.x");
        assert!(pattern.substitute(&[Segment::Index(1)]).is_none());
    }

    #[test]
    fn expand_walks_arrays_and_keeps_missing_leaves() {
        let document = json!({"items": [{"price": 1}, {}]});
        let pattern = PathPattern::parse("items.*.price").unwrap();
        let expanded: Vec<String> = pattern
            .expand(&document)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(expanded, vec!["items.0.price", "items.1.price"]);
        assert!(PathPattern::parse("missing.*").unwrap().expand(&document).is_empty());
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(
            PathPattern::parse("items.*.tags.0").unwrap().to_string(),
            "items.*.tags.0"
        );
        assert!(PathPattern::parse("a..b").is_err());
    }
}
