//! Running the validator and writing its verdicts back into field records.
//!
//! Every validation takes a new generation from the field it targets before
//! calling the validator. When the result comes back, it is stored only if the
//! field still carries that generation; a newer validation, a reset or a
//! removal in the meantime makes the result stale and it is dropped.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use formstate_model::{FieldId, FieldPath, IntoFieldPath, Result};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, error, trace};

use super::{FormController, Shared};

/// Keeps the scheduled-task count accurate even if a task is cancelled.
struct ScheduledGuard(Arc<Shared>);

impl ScheduledGuard {
    fn enter(shared: &Arc<Shared>) -> Self {
        shared.scheduled.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(shared))
    }
}

impl Drop for ScheduledGuard {
    fn drop(&mut self) {
        if self.0.scheduled.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl FormController {
    /// Validate every registered field. Returns whether all of them passed.
    ///
    /// Does not touch `dirty` or `touched`; messages are stored regardless and
    /// the UI decides when to show them.
    pub async fn validate(&self) -> bool {
        let paths = self.lock().registry.paths();
        debug!(fields = paths.len(), "validating form");
        let results = join_all(paths.iter().map(|path| self.run_validation(path))).await;
        results.into_iter().all(|valid| valid)
    }

    /// Mark one field dirty and touched, then validate it.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub async fn validate_field(&self, path: impl IntoFieldPath) -> Result<bool> {
        let path = path.into_field_path()?;
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let state = inner.registry.get_or_insert(&path);
            state.dirty = true;
            state.touched = true;
            inner.form.dirty = true;
            inner.form.touched = true;
            inner.form.bump();
        }
        Ok(self.run_validation(&path).await)
    }

    /// Resolve once no input-triggered validation is pending or running.
    pub async fn settled(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.scheduled.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Debounced validation of the field `id`, then of its touched
    /// dependents. The path is resolved after the window, so array moves in
    /// the meantime are followed.
    pub(super) fn schedule_validation(&self, id: FieldId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(field = %id.short(), "no async runtime, skipping scheduled validation");
            return;
        };
        let ticket = self.shared.debouncer.arm(id);
        let guard = ScheduledGuard::enter(&self.shared);
        let form = self.clone();
        runtime.spawn(async move {
            let _guard = guard;
            if !form.shared.debouncer.wait(&id, ticket).await {
                trace!(field = %id.short(), "superseded");
                return;
            }
            let Some(path) = form.path_of(id) else {
                trace!(field = %id.short(), "field removed before validation");
                return;
            };
            form.run_validation(&path).await;
            if form.shared.config.revalidate_dependents {
                form.revalidate_dependents(&path).await;
            }
        });
    }

    /// Debounced cascade to the touched dependents of a path that has no
    /// record of its own.
    pub(super) fn schedule_dependents(&self, path: FieldPath) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(path = %path, "no async runtime, skipping dependent revalidation");
            return;
        };
        let ticket = self.shared.path_debouncer.arm(path.clone());
        let guard = ScheduledGuard::enter(&self.shared);
        let form = self.clone();
        runtime.spawn(async move {
            let _guard = guard;
            if form.shared.path_debouncer.wait(&path, ticket).await {
                form.revalidate_dependents(&path).await;
            } else {
                trace!(path = %path, "superseded");
            }
        });
    }

    async fn revalidate_dependents(&self, path: &FieldPath) {
        let dependents = self.shared.validator.dependent_fields(path);
        let targets: Vec<FieldPath> = {
            let inner = self.lock();
            dependents
                .into_iter()
                .filter(|dependent| dependent != path)
                .filter(|dependent| inner.registry.get(dependent).is_some_and(|s| s.touched))
                .collect()
        };
        if targets.is_empty() {
            return;
        }
        debug!(path = %path, dependents = targets.len(), "revalidating dependents");
        join_all(targets.iter().map(|target| self.run_validation(target))).await;
    }

    /// Validate one path and store the outcome if it is still current.
    pub(super) async fn run_validation(&self, path: &FieldPath) -> bool {
        let (id, generation, document) = self.begin_validation(path);
        let outcome = self.shared.validator.validate_path(path, &document).await;
        let (valid, errors) = match outcome {
            Ok(valid) => (valid, self.shared.validator.errors_for_path(path)),
            Err(fault) => {
                error!(path = %path, error = %fault, "validator failed");
                let mut errors = self.shared.validator.errors_for_path(path);
                if errors.is_empty() {
                    errors.push(fault.to_string());
                }
                (false, errors)
            }
        };
        self.finish_validation(id, generation, errors);
        valid
    }

    fn begin_validation(&self, path: &FieldPath) -> (FieldId, u64, Value) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let state = inner.registry.get_or_insert(path);
        let generation = state.next_generation();
        state.validating = true;
        let id = state.id;
        inner.form.begin_validation();
        inner.form.bump();
        (id, generation, inner.document.clone())
    }

    fn finish_validation(&self, id: FieldId, generation: u64, errors: Vec<String>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.form.end_validation();
        inner.form.bump();
        match inner.registry.by_id_mut(id) {
            Some(state) if state.generation() == generation => {
                state.errors = errors;
                state.validating = false;
            }
            Some(_) => trace!(field = %id.short(), "stale validation result dropped"),
            None => debug!(field = %id.short(), "field removed while validating"),
        }
    }
}
