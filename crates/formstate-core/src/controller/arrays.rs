//! Array manipulation that keeps field records attached to their elements.
//!
//! Each operation edits the document array and reindexes the registry under
//! the same lock, so no reader can observe one without the other.

use std::cmp::Ordering;
use std::collections::HashMap;

use formstate_model::{FieldPath, IntoFieldPath, Result, json_type_name};
use serde_json::Value;
use tracing::debug;

use super::FormController;
use crate::access;
use crate::events::EventPayload;

impl FormController {
    /// Insert `item` at `index` (clamped to the length). Field records of
    /// later elements shift up by one. A missing or `null` target becomes a
    /// one-element array; any other non-array target is left alone.
    ///
    /// Returns whether the document changed.
    ///
    /// # Errors
    ///
    /// Fails only if `array_path` does not parse.
    pub fn add(&self, array_path: impl IntoFieldPath, index: usize, item: Value) -> Result<bool> {
        let path = array_path.into_field_path()?;
        let updated = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let found = access::get(&inner.document, &path).map(json_type_name);
            match found {
                None | Some("null") => {
                    if !access::set(&mut inner.document, &path, Value::Array(vec![item])) {
                        return Ok(false);
                    }
                }
                Some("array") => {
                    let Some(items) = access::array_mut(&mut inner.document, &path) else {
                        return Ok(false);
                    };
                    let at = index.min(items.len());
                    items.insert(at, item);
                    inner.registry.shift(&path, at, 1);
                }
                Some(other) => {
                    debug!(path = %path, found = other, "add target is not an array");
                    return Ok(false);
                }
            }
            inner.form.dirty = true;
            inner.form.bump();
            access::get(&inner.document, &path).cloned()
        };
        self.array_changed(path, updated);
        Ok(true)
    }

    /// Remove the element at `index`, dropping its field records and shifting
    /// later ones down. Returns the removed element.
    ///
    /// # Errors
    ///
    /// Fails only if `array_path` does not parse.
    pub fn remove(&self, array_path: impl IntoFieldPath, index: usize) -> Result<Option<Value>> {
        let path = array_path.into_field_path()?;
        let (removed, dropped, updated) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let Some(items) = access::array_mut(&mut inner.document, &path) else {
                debug!(path = %path, "remove target is not an array");
                return Ok(None);
            };
            if index >= items.len() {
                debug!(path = %path, index, len = items.len(), "remove index out of range");
                return Ok(None);
            }
            let removed = items.remove(index);
            let dropped = inner.registry.remove_index(&path, index);
            inner.form.dirty = true;
            inner.form.bump();
            (removed, dropped, access::get(&inner.document, &path).cloned())
        };
        for id in &dropped {
            self.shared.debouncer.cancel(id);
        }
        self.array_changed(path, updated);
        Ok(Some(removed))
    }

    /// Move the element at `from` to `to` (clamped to the last position).
    /// Field records travel with the element. Returns whether anything moved.
    ///
    /// # Errors
    ///
    /// Fails only if `array_path` does not parse.
    pub fn move_item(&self, array_path: impl IntoFieldPath, from: usize, to: usize) -> Result<bool> {
        let path = array_path.into_field_path()?;
        let updated = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let Some(items) = access::array_mut(&mut inner.document, &path) else {
                debug!(path = %path, "move target is not an array");
                return Ok(false);
            };
            if from >= items.len() {
                debug!(path = %path, from, len = items.len(), "move index out of range");
                return Ok(false);
            }
            let to = to.min(items.len() - 1);
            if from == to {
                return Ok(false);
            }
            let item = items.remove(from);
            items.insert(to, item);
            inner.registry.move_index(&path, from, to);
            inner.form.dirty = true;
            inner.form.bump();
            access::get(&inner.document, &path).cloned()
        };
        self.array_changed(path, updated);
        Ok(true)
    }

    /// Stable-sort the array with `compare`; field records follow their
    /// elements. Returns whether the order changed.
    ///
    /// The comparator runs on a snapshot without holding the form lock, so it
    /// may read from the controller.
    ///
    /// # Errors
    ///
    /// Fails only if `array_path` does not parse.
    pub fn sort_by<F>(&self, array_path: impl IntoFieldPath, mut compare: F) -> Result<bool>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let path = array_path.into_field_path()?;
        let snapshot = match access::get(&self.lock().document, &path) {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                debug!(path = %path, "sort target is not an array");
                return Ok(false);
            }
        };

        let mut order: Vec<usize> = (0..snapshot.len()).collect();
        order.sort_by(|a, b| compare(&snapshot[*a], &snapshot[*b]));
        let positions: HashMap<usize, usize> = order
            .iter()
            .enumerate()
            .filter(|(new, old)| *new != **old)
            .map(|(new, old)| (*old, new))
            .collect();
        if positions.is_empty() {
            return Ok(false);
        }

        let updated = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let Some(items) = access::array_mut(&mut inner.document, &path) else {
                return Ok(false);
            };
            if items.len() != order.len() {
                debug!(path = %path, "array changed during sort; skipped");
                return Ok(false);
            }
            permute(items, &order);
            inner.registry.reorder(&path, &positions);
            inner.form.dirty = true;
            inner.form.bump();
            access::get(&inner.document, &path).cloned()
        };
        debug!(path = %path, moved = positions.len(), "array sorted");
        self.array_changed(path, updated);
        Ok(true)
    }

    fn array_changed(&self, path: FieldPath, updated: Option<Value>) {
        self.emit(EventPayload::FieldChanged {
            path,
            value: updated.unwrap_or(Value::Null),
        });
    }
}

/// Rearrange `items` so that position `new` holds the element previously at
/// `order[new]`.
fn permute(items: &mut Vec<Value>, order: &[usize]) {
    let mut slots: Vec<Option<Value>> = std::mem::take(items).into_iter().map(Some).collect();
    items.extend(order.iter().filter_map(|old| slots.get_mut(*old).and_then(Option::take)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn permute_follows_order() {
        let mut items = vec![json!("a"), json!("b"), json!("c")];
        permute(&mut items, &[2, 0, 1]);
        assert_eq!(items, vec![json!("c"), json!("a"), json!("b")]);
    }
}
