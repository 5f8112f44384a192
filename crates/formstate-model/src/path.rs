//! Dot-delimited field paths and addresses.
//!
//! A path such as `items.0.price` is parsed once into typed segments so the
//! registry and the accessor never have to re-split strings. Numeric segments
//! are array indices; there is no escaping, so object keys cannot contain dots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FormError, Result};
use crate::field::MetaKey;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object property.
    Key(String),
    /// Zero-based array index.
    Index(usize),
}

impl Segment {
    /// Classify a raw segment: a canonical non-negative integer (`0`, or
    /// digits without a leading zero) is an index. `01` stays a key, so
    /// parse and display round-trip.
    pub fn parse(raw: &str) -> Self {
        let canonical = raw == "0" || !raw.starts_with('0');
        if canonical && !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse::<usize>() {
                return Self::Index(index);
            }
        }
        Self::Key(raw.to_string())
    }

    /// The index, if this is an index segment.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }

    /// Whether this is an index segment.
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Parsed dot-delimited address into a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// Parse `segment(.segment)*`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::EmptyPath`] for an empty string and
    /// [`FormError::EmptySegment`] when any segment is empty.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(FormError::EmptyPath);
        }
        let mut segments = Vec::new();
        for raw in text.split('.') {
            if raw.is_empty() {
                return Err(FormError::EmptySegment {
                    path: text.to_string(),
                });
            }
            segments.push(Segment::parse(raw));
        }
        Ok(Self(segments))
    }

    /// The empty path, addressing the document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Path with an object key appended.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.into()));
        Self(segments)
    }

    /// Path with an array index appended.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }

    /// Path with another path appended.
    #[must_use]
    pub fn join(&self, rest: &FieldPath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(rest.0.iter().cloned());
        Self(segments)
    }

    /// Path without its last segment, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.0.split_last()?;
        Some(Self(head.to_vec()))
    }

    /// Whether `prefix` is a leading run of this path's segments.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The array index at `depth`, if that segment is an index.
    pub fn index_at(&self, depth: usize) -> Option<usize> {
        self.0.get(depth).and_then(Segment::as_index)
    }

    /// For paths of the form `prefix.<n>[.rest]`, the element index `n`.
    pub fn element_index(&self, prefix: &FieldPath) -> Option<usize> {
        if !self.starts_with(prefix) {
            return None;
        }
        self.index_at(prefix.len())
    }

    /// Copy of this path with the segment at `depth` replaced by `index`.
    #[must_use]
    pub fn with_index_at(&self, depth: usize, index: usize) -> Self {
        let mut segments = self.0.clone();
        if let Some(segment) = segments.get_mut(depth) {
            *segment = Segment::Index(index);
        }
        Self(segments)
    }

    /// Last object key in the path, used for human-readable labels.
    pub fn label(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|segment| match segment {
            Segment::Key(key) => Some(key.as_str()),
            Segment::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = FormError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Conversion into a [`FieldPath`], so APIs accept both strings and parsed
/// paths.
pub trait IntoFieldPath {
    /// # Errors
    ///
    /// Fails when a string does not parse as a path.
    fn into_field_path(self) -> Result<FieldPath>;
}

impl IntoFieldPath for FieldPath {
    fn into_field_path(self) -> Result<FieldPath> {
        Ok(self)
    }
}

impl IntoFieldPath for &FieldPath {
    fn into_field_path(self) -> Result<FieldPath> {
        Ok(self.clone())
    }
}

impl IntoFieldPath for &str {
    fn into_field_path(self) -> Result<FieldPath> {
        FieldPath::parse(self)
    }
}

impl IntoFieldPath for &String {
    fn into_field_path(self) -> Result<FieldPath> {
        FieldPath::parse(self)
    }
}

impl IntoFieldPath for String {
    fn into_field_path(self) -> Result<FieldPath> {
        FieldPath::parse(&self)
    }
}

/// A parsed address: either business data or one metadata attribute of it.
///
/// Syntax: `segment(.segment)*` for values and `segment(.segment)*.$name` for
/// metadata, where `name` is one of the [`MetaKey`] names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Value(FieldPath),
    Meta(FieldPath, MetaKey),
}

impl Address {
    /// Parse an address string.
    ///
    /// # Errors
    ///
    /// Fails on malformed paths and unknown `$` names.
    pub fn parse(text: &str) -> Result<Self> {
        match text.rsplit_once('.') {
            Some((path, last)) if last.starts_with('$') => {
                let key = MetaKey::from_name(&last[1..])?;
                Ok(Self::Meta(FieldPath::parse(path)?, key))
            }
            _ if text.starts_with('$') => Err(FormError::EmptyPath),
            _ => Ok(Self::Value(FieldPath::parse(text)?)),
        }
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            Self::Value(path) | Self::Meta(path, _) => path,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(path) => write!(f, "{path}"),
            Self::Meta(path, key) => write!(f, "{path}.{key}"),
        }
    }
}

impl FromStr for Address {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
