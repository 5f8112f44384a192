//! Field state registry.
//!
//! Records live in an arena keyed by their stable [`FieldId`]; a separate
//! `FieldPath -> FieldId` index says where each record currently sits in the
//! document. Array reindexing only rewrites the index, so a record (and its
//! identity) follows its element through inserts, removals, moves and sorts.
//!
//! Every reindex is applied as one batch: all affected keys are removed from
//! the index first and re-inserted afterwards, so two fields never alias the
//! same key halfway through a rename. If a rename still lands on a key owned
//! by an unaffected record, the moved record wins and the displaced record is
//! dropped.

use std::collections::{BTreeMap, HashMap};

use formstate_model::{FieldId, FieldPath, FieldState};

/// What happens to the fields of one array element during a reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relocation {
    Keep,
    MoveTo(usize),
    Drop,
}

/// Path-addressed store of [`FieldState`] records.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    records: HashMap<FieldId, FieldState>,
    index: BTreeMap<FieldPath, FieldId>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn has(&self, path: &FieldPath) -> bool {
        self.index.contains_key(path)
    }

    pub fn id_of(&self, path: &FieldPath) -> Option<FieldId> {
        self.index.get(path).copied()
    }

    /// Current path of a record.
    pub fn path_of(&self, id: FieldId) -> Option<&FieldPath> {
        self.index
            .iter()
            .find_map(|(path, candidate)| (*candidate == id).then_some(path))
    }

    pub fn get(&self, path: &FieldPath) -> Option<&FieldState> {
        self.index.get(path).and_then(|id| self.records.get(id))
    }

    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut FieldState> {
        let id = self.index.get(path)?;
        self.records.get_mut(id)
    }

    pub fn by_id(&self, id: FieldId) -> Option<&FieldState> {
        self.records.get(&id)
    }

    pub fn by_id_mut(&mut self, id: FieldId) -> Option<&mut FieldState> {
        self.records.get_mut(&id)
    }

    /// Existing record at `path`, or a fresh one with a new identity.
    pub fn get_or_insert(&mut self, path: &FieldPath) -> &mut FieldState {
        let id = match self.index.get(path) {
            Some(id) => *id,
            None => {
                let state = FieldState::new();
                let id = state.id;
                tracing::trace!(path = %path, id = %id.short(), "registered field");
                self.records.insert(id, state);
                self.index.insert(path.clone(), id);
                id
            }
        };
        // The index and the arena are updated together, so the entry exists;
        // a record rebuilt here would keep the indexed identity.
        self.records.entry(id).or_insert_with(|| {
            let mut state = FieldState::new();
            state.id = id;
            state
        })
    }

    /// Remove the record at `path`.
    pub fn delete(&mut self, path: &FieldPath) -> Option<FieldState> {
        let id = self.index.remove(path)?;
        self.records.remove(&id)
    }

    /// Records in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &FieldState)> {
        self.index
            .iter()
            .filter_map(|(path, id)| self.records.get(id).map(|state| (path, state)))
    }

    pub fn paths(&self) -> Vec<FieldPath> {
        self.index.keys().cloned().collect()
    }

    pub fn states_mut(&mut self) -> impl Iterator<Item = &mut FieldState> {
        self.records.values_mut()
    }

    /// Keep only the records for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&FieldPath, &FieldState) -> bool) {
        let records = &mut self.records;
        self.index.retain(|path, id| {
            let keep_it = records.get(id).is_some_and(|state| keep(path, state));
            if !keep_it {
                records.remove(id);
            }
            keep_it
        });
    }

    /// Rename `array_path.<n>[.rest]` to `array_path.<n + offset>[.rest]` for
    /// every `n >= from_index`. Fields pushed below index zero are dropped.
    pub fn shift(&mut self, array_path: &FieldPath, from_index: usize, offset: isize) {
        self.relocate(array_path, |n| {
            if n < from_index {
                return Relocation::Keep;
            }
            match n.checked_add_signed(offset) {
                Some(target) => Relocation::MoveTo(target),
                None => Relocation::Drop,
            }
        });
    }

    /// Reindex after `array.splice(from, 1)` followed by
    /// `array.splice(to, 0, item)`.
    pub fn move_index(&mut self, array_path: &FieldPath, from: usize, to: usize) {
        self.relocate(array_path, |n| {
            if n == from {
                Relocation::MoveTo(to)
            } else if from < to && n > from && n <= to {
                Relocation::MoveTo(n - 1)
            } else if from > to && n >= to && n < from {
                Relocation::MoveTo(n + 1)
            } else {
                Relocation::Keep
            }
        });
    }

    /// Apply an arbitrary `old index -> new index` permutation. Indices that
    /// are not in `positions` keep their place.
    pub fn reorder(&mut self, array_path: &FieldPath, positions: &HashMap<usize, usize>) {
        self.relocate(array_path, |n| match positions.get(&n) {
            Some(target) => Relocation::MoveTo(*target),
            None => Relocation::Keep,
        });
    }

    /// Drop every field of element `index` and close the gap. Returns the ids
    /// of the dropped records.
    pub fn remove_index(&mut self, array_path: &FieldPath, index: usize) -> Vec<FieldId> {
        self.relocate(array_path, |n| match n.cmp(&index) {
            std::cmp::Ordering::Less => Relocation::Keep,
            std::cmp::Ordering::Equal => Relocation::Drop,
            std::cmp::Ordering::Greater => Relocation::MoveTo(n - 1),
        })
    }

    fn relocate(
        &mut self,
        array_path: &FieldPath,
        mut plan: impl FnMut(usize) -> Relocation,
    ) -> Vec<FieldId> {
        let depth = array_path.len();
        let mut renames = Vec::new();
        let mut dropped = Vec::new();

        for (path, id) in &self.index {
            let Some(current) = path.element_index(array_path) else {
                continue;
            };
            match plan(current) {
                Relocation::Keep => {}
                Relocation::MoveTo(target) if target == current => {}
                Relocation::MoveTo(target) => {
                    renames.push((path.clone(), path.with_index_at(depth, target), *id));
                }
                Relocation::Drop => dropped.push((path.clone(), *id)),
            }
        }

        for (path, id) in &dropped {
            self.index.remove(path);
            self.records.remove(id);
        }
        for (old, _, _) in &renames {
            self.index.remove(old);
        }
        let renamed = renames.len();
        for (new, id) in renames.into_iter().map(|(_, new, id)| (new, id)) {
            if let Some(displaced) = self.index.insert(new.clone(), id) {
                if displaced != id {
                    tracing::warn!(
                        path = %new,
                        kept = %id.short(),
                        dropped = %displaced.short(),
                        "reindex collision, keeping the moved field"
                    );
                    self.records.remove(&displaced);
                }
            }
        }

        tracing::debug!(
            array = %array_path,
            renamed,
            dropped = dropped.len(),
            "reindexed array fields"
        );
        dropped.into_iter().map(|(_, id)| id).collect()
    }
}
