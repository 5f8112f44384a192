//! Reading and writing values at a [`FieldPath`] inside a document.
//!
//! Missing values are `None`, never errors. Writes create intermediate
//! containers on demand; whether a container is an array or an object is
//! decided by [`ContainerKind::for_next`] from the segment that follows.

use formstate_model::{FieldPath, Segment};
use serde_json::Value;

/// Kind of container created for a missing intermediate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Array,
    Object,
}

impl ContainerKind {
    /// An index segment next means the container must be an array.
    pub fn for_next(next: &Segment) -> Self {
        if next.is_index() {
            Self::Array
        } else {
            Self::Object
        }
    }

    pub fn empty(self) -> Value {
        match self {
            Self::Array => Value::Array(Vec::new()),
            Self::Object => Value::Object(serde_json::Map::new()),
        }
    }
}

/// Most `null` slots a single write may append to reach an index past the
/// end of an array. Writes further out are ignored.
pub const MAX_PAD: usize = 1024;

/// Slot `index` of `items`, padding with `null` up to [`MAX_PAD`] slots.
fn slot(items: &mut Vec<Value>, index: usize) -> Option<&mut Value> {
    if index >= items.len() {
        if index - items.len() > MAX_PAD {
            return None;
        }
        items.resize(index + 1, Value::Null);
    }
    items.get_mut(index)
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get_mut(key),
        (Value::Object(map), Segment::Index(index)) => map.get_mut(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
        _ => None,
    }
}

/// Value at `path`, or `None` when any step is missing.
pub fn get<'a>(document: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(document, |current, segment| step(current, segment))
}

/// Mutable value at `path`, or `None` when any step is missing.
pub fn get_mut<'a>(document: &'a mut Value, path: &FieldPath) -> Option<&'a mut Value> {
    path.segments()
        .iter()
        .try_fold(document, |current, segment| step_mut(current, segment))
}

/// Whether `path` resolves to a value (including `null`).
pub fn resolves(document: &Value, path: &FieldPath) -> bool {
    get(document, path).is_some()
}

/// Mutable array at `path`, if the value there is an array.
pub fn array_mut<'a>(document: &'a mut Value, path: &FieldPath) -> Option<&'a mut Vec<Value>> {
    get_mut(document, path).and_then(Value::as_array_mut)
}

/// Child of `container` at `segment`, creating a `kind` container when the
/// slot is missing or `null`. `None` when the step would have to go through
/// a scalar.
fn child_or_insert<'a>(
    container: &'a mut Value,
    segment: &Segment,
    kind: ContainerKind,
) -> Option<&'a mut Value> {
    let child = match (container, segment) {
        (Value::Object(map), segment) => map
            .entry(segment.to_string())
            .or_insert_with(|| kind.empty()),
        (Value::Array(items), Segment::Index(index)) => slot(items, *index)?,
        _ => return None,
    };
    if child.is_null() {
        *child = kind.empty();
    }
    if is_container(child) { Some(child) } else { None }
}

fn assign(container: &mut Value, segment: &Segment, value: Value) -> bool {
    match (container, segment) {
        (Value::Object(map), segment) => {
            map.insert(segment.to_string(), value);
            true
        }
        (Value::Array(items), Segment::Index(index)) => match slot(items, *index) {
            Some(target) => {
                *target = value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Whether [`set`] can reach `path` without going through a scalar, keying
/// into an array, or padding past [`MAX_PAD`].
fn writable(document: &Value, path: &FieldPath) -> bool {
    let mut current = Some(document);
    for segment in path.segments() {
        current = match (current, segment) {
            (None | Some(Value::Null), Segment::Index(index)) if *index > MAX_PAD => return false,
            (None | Some(Value::Null), _) => None,
            (Some(Value::Object(map)), segment) => map.get(&segment.to_string()),
            (Some(Value::Array(items)), Segment::Index(index)) => {
                if *index >= items.len() && *index - items.len() > MAX_PAD {
                    return false;
                }
                items.get(*index)
            }
            _ => return false,
        };
    }
    true
}

/// Write `value` at `path`, creating intermediate containers.
///
/// Returns `false` without touching the document when an intermediate step
/// exists but is a scalar, when an array is addressed with a key, or when an
/// index lies more than [`MAX_PAD`] slots past the end of its array. An
/// empty path replaces the whole document.
pub fn set(document: &mut Value, path: &FieldPath, value: Value) -> bool {
    let segments = path.segments();
    let Some((last, parents)) = segments.split_last() else {
        *document = value;
        return true;
    };
    if !writable(document, path) {
        tracing::debug!(path = %path, "write target is not addressable");
        return false;
    }

    let mut current = document;
    for (depth, segment) in parents.iter().enumerate() {
        let kind = ContainerKind::for_next(&segments[depth + 1]);
        match child_or_insert(current, segment, kind) {
            Some(child) => current = child,
            None => {
                tracing::debug!(path = %path, depth, "write blocked by a non-container value");
                return false;
            }
        }
    }
    let written = assign(current, last, value);
    if !written {
        tracing::debug!(path = %path, "write target is not addressable");
    }
    written
}

/// Every path that ends at a scalar or an empty container, in document order.
pub fn leaf_paths(document: &Value) -> Vec<FieldPath> {
    fn walk(value: &Value, prefix: &FieldPath, out: &mut Vec<FieldPath>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    walk(child, &prefix.key(key.as_str()), out);
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (index, child) in items.iter().enumerate() {
                    walk(child, &prefix.index(index), out);
                }
            }
            _ if !prefix.is_empty() => out.push(prefix.clone()),
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(document, &FieldPath::root(), &mut out);
    out
}

/// Type-appropriate empty value used when resetting keys that did not exist
/// at construction: arrays become `[]`, objects `{}`, everything else `null`.
pub fn empty_like(value: &Value) -> Value {
    match value {
        Value::Array(_) => ContainerKind::Array.empty(),
        Value::Object(_) => ContainerKind::Object.empty(),
        _ => Value::Null,
    }
}
