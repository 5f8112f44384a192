//! The form controller.
//!
//! [`FormController`] owns one document, the field registry that shadows it,
//! and the form-wide flags. It is a cheap handle: clones share the same form,
//! which is how submit handlers and spawned validation tasks reach back into
//! it.
//!
//! All state sits behind one mutex. The lock is never held across an await
//! point or while event handlers run, so handlers may call back into the
//! controller.

mod arrays;
mod builder;
mod lifecycle;
mod validation;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use formstate_model::{
    Address, FieldId, FieldPath, FieldState, FormError, FormId, FormState, IntoFieldPath, MetaKey,
    MetaValue, Result,
};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::debug;

use crate::access;
use crate::config::ControllerConfig;
use crate::debounce::Debouncer;
use crate::events::{EventBus, EventPayload, FormEvent};
use crate::registry::FieldRegistry;
use crate::validator::Validator;

pub use builder::FormBuilder;

/// Callback run by [`FormController::submit`] once the form validates.
///
/// It receives a snapshot of the document and a handle to the form. An `Err`
/// becomes a `submit_error` event.
pub type SubmitHandler =
    Arc<dyn Fn(Value, FormController) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`SubmitHandler`].
pub fn submit_handler<F, Fut>(handler: F) -> SubmitHandler
where
    F: Fn(Value, FormController) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |document, form| Box::pin(handler(document, form)))
}

/// Path-addressed reactive form state.
#[derive(Clone)]
pub struct FormController {
    shared: Arc<Shared>,
}

struct Shared {
    id: FormId,
    config: ControllerConfig,
    validator: Arc<dyn Validator>,
    events: EventBus,
    on_submit: Option<SubmitHandler>,
    /// Document as first supplied; `reset` restores from it.
    original: Value,
    debouncer: Debouncer<FieldId>,
    /// Dependent cascades for writes to unregistered paths.
    path_debouncer: Debouncer<FieldPath>,
    /// Input-triggered validation tasks not yet finished.
    scheduled: AtomicUsize,
    idle: Notify,
    state: Mutex<FormInner>,
}

struct FormInner {
    document: Value,
    registry: FieldRegistry,
    form: FormState,
}

impl fmt::Debug for FormController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("FormController")
            .field("id", &self.shared.id)
            .field("fields", &inner.registry.len())
            .field("form", &inner.form)
            .finish()
    }
}

impl FormController {
    /// Start configuring a controller over `document`.
    pub fn builder(document: Value) -> FormBuilder {
        FormBuilder::new(document)
    }

    /// A controller with default config, no validation and a private bus.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidDocument`] if the root is not an object or
    /// an array.
    pub fn new(document: Value) -> Result<Self> {
        Self::builder(document).build()
    }

    pub fn id(&self) -> FormId {
        self.shared.id
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn validator(&self) -> &Arc<dyn Validator> {
        &self.shared.validator
    }

    fn lock(&self) -> MutexGuard<'_, FormInner> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, payload: EventPayload) {
        self.shared
            .events
            .emit(&FormEvent::new(self.shared.id, payload));
    }

    // ---- business data ----

    /// Read the value at `path`, registering the field on first access.
    ///
    /// Returns `None` when nothing is stored there.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn read_path(&self, path: impl IntoFieldPath) -> Result<Option<Value>> {
        let path = path.into_field_path()?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        let value = access::get(&inner.document, &path).cloned();
        inner.registry.get_or_insert(&path);
        Ok(value)
    }

    /// Write `value` at `path`, creating intermediate containers.
    ///
    /// Marks the field and the form dirty and emits `field_changed`. With
    /// input validation on, a debounced validation of the field and of its
    /// touched dependents is scheduled. Unregistered paths get no record; only
    /// their touched dependents are revalidated.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn write_path(&self, path: impl IntoFieldPath, value: Value) -> Result<()> {
        let path = path.into_field_path()?;
        let registered = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if !access::set(&mut inner.document, &path, value.clone()) {
                return Ok(());
            }
            let id = inner.registry.get_mut(&path).map(|state| {
                state.dirty = true;
                state.id
            });
            inner.form.dirty = true;
            inner.form.bump();
            id
        };
        debug!(path = %path, "value written");
        self.emit(EventPayload::FieldChanged {
            path: path.clone(),
            value,
        });
        if self.shared.config.validate_on_input {
            match registered {
                Some(id) => self.schedule_validation(id),
                None if self.shared.config.revalidate_dependents => {
                    self.schedule_dependents(path);
                }
                None => {}
            }
        }
        Ok(())
    }

    // ---- metadata ----

    /// Read one metadata attribute, registering the field on first access.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn read_meta(&self, path: impl IntoFieldPath, key: MetaKey) -> Result<MetaValue> {
        let path = path.into_field_path()?;
        Ok(self.lock().registry.get_or_insert(&path).meta(key))
    }

    /// Write one metadata attribute. Returns whether the value changed.
    ///
    /// Setting `isTouched` or `isDirty` to true also raises the matching form
    /// flag.
    ///
    /// # Errors
    ///
    /// Fails if `path` does not parse or `value` has the wrong type for `key`.
    pub fn write_meta(&self, path: impl IntoFieldPath, key: MetaKey, value: MetaValue) -> Result<bool> {
        let path = path.into_field_path()?;
        let raised = value.as_flag() == Some(true);
        let mut guard = self.lock();
        let inner = &mut *guard;
        let changed = inner.registry.get_or_insert(&path).set_meta(key, value)?;
        if changed {
            match key {
                MetaKey::IsTouched if raised => inner.form.touched = true,
                MetaKey::IsDirty if raised => inner.form.dirty = true,
                _ => {}
            }
            inner.form.bump();
        }
        Ok(changed)
    }

    // ---- unified addressing ----

    /// Read a value or metadata address such as `email` or `email.$errors`.
    ///
    /// Missing values read as `null`.
    ///
    /// # Errors
    ///
    /// Fails on malformed addresses.
    pub fn read(&self, address: &str) -> Result<Value> {
        match Address::parse(address)? {
            Address::Value(path) => Ok(self.read_path(path)?.unwrap_or(Value::Null)),
            Address::Meta(path, key) => Ok(self.read_meta(path, key)?.to_json()),
        }
    }

    /// Write a value or metadata address.
    ///
    /// # Errors
    ///
    /// Fails on malformed addresses and on metadata values of the wrong type.
    pub fn write(&self, address: &str, value: Value) -> Result<()> {
        match Address::parse(address)? {
            Address::Value(path) => self.write_path(path, value),
            Address::Meta(path, key) => {
                let value = MetaValue::from_json(key, &value)?;
                self.write_meta(path, key, value).map(|_| ())
            }
        }
    }

    // ---- registration ----

    /// Register `path` explicitly (what a UI binding does on mount).
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn register(&self, path: impl IntoFieldPath) -> Result<FieldId> {
        let path = path.into_field_path()?;
        Ok(self.lock().registry.get_or_insert(&path).id)
    }

    /// Drop the field record at `path`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn unregister(&self, path: impl IntoFieldPath) -> Result<bool> {
        let path = path.into_field_path()?;
        let removed = {
            let mut inner = self.lock();
            let removed = inner.registry.delete(&path);
            if removed.is_some() {
                inner.form.bump();
            }
            removed
        };
        match removed {
            Some(state) => {
                self.shared.debouncer.cancel(&state.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ---- snapshots ----

    /// Metadata of a registered field, without registering it.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn field_state(&self, path: impl IntoFieldPath) -> Result<Option<FieldState>> {
        let path = path.into_field_path()?;
        Ok(self.lock().registry.get(&path).cloned())
    }

    pub fn field_state_by_id(&self, id: FieldId) -> Option<FieldState> {
        self.lock().registry.by_id(id).cloned()
    }

    /// Current path of the field with identity `id`.
    pub fn path_of(&self, id: FieldId) -> Option<FieldPath> {
        self.lock().registry.path_of(id).cloned()
    }

    /// Every registered field in path order.
    pub fn fields(&self) -> Vec<(FieldPath, FieldState)> {
        self.lock()
            .registry
            .iter()
            .map(|(path, state)| (path.clone(), state.clone()))
            .collect()
    }

    pub fn form_state(&self) -> FormState {
        self.lock().form.clone()
    }

    /// Incremented on every observable mutation; cheap change detection for
    /// renderers.
    pub fn version(&self) -> u64 {
        self.lock().form.version
    }

    /// Snapshot of the current document.
    pub fn document(&self) -> Value {
        self.lock().document.clone()
    }

    /// The document as supplied at construction.
    pub fn original(&self) -> &Value {
        &self.shared.original
    }

    /// Current messages of every field that has any, keyed by path.
    pub fn errors(&self) -> BTreeMap<String, Vec<String>> {
        self.lock()
            .registry
            .iter()
            .filter(|(_, state)| !state.errors.is_empty())
            .map(|(path, state)| (path.to_string(), state.errors.clone()))
            .collect()
    }

    /// Whether no registered field currently carries errors.
    pub fn is_valid(&self) -> bool {
        self.lock().registry.iter().all(|(_, state)| state.is_valid())
    }

    // ---- focus ----

    /// Report that the UI element bound to `path` gained focus.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn focus(&self, path: impl IntoFieldPath) -> Result<()> {
        let path = path.into_field_path()?;
        self.lock().registry.get_or_insert(&path);
        self.emit(EventPayload::FieldFocused { path });
        Ok(())
    }

    /// Report that `path` lost focus: marks it touched and, when configured,
    /// schedules its validation.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn blur(&self, path: impl IntoFieldPath) -> Result<()> {
        let path = path.into_field_path()?;
        let id = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let state = inner.registry.get_or_insert(&path);
            state.touched = true;
            let id = state.id;
            inner.form.touched = true;
            inner.form.bump();
            id
        };
        self.emit(EventPayload::FieldBlurred { path });
        if self.shared.config.validate_on_blur {
            self.schedule_validation(id);
        }
        Ok(())
    }

    // ---- external errors ----

    /// Replace the messages of several fields at once, e.g. with errors
    /// returned by a server. Affected fields are marked touched so the
    /// messages show.
    ///
    /// # Errors
    ///
    /// Fails if any key does not parse; nothing is changed in that case.
    pub fn set_errors(&self, errors: BTreeMap<String, Vec<String>>) -> Result<()> {
        let parsed = errors
            .into_iter()
            .map(|(path, messages)| Ok((FieldPath::parse(&path)?, messages)))
            .collect::<Result<Vec<_>>>()?;
        if parsed.is_empty() {
            return Ok(());
        }
        let mut guard = self.lock();
        let inner = &mut *guard;
        for (path, messages) in parsed {
            let state = inner.registry.get_or_insert(&path);
            state.errors = messages;
            state.touched = true;
        }
        inner.form.touched = true;
        inner.form.bump();
        Ok(())
    }

    /// Replace the messages of one field and mark it touched.
    ///
    /// # Errors
    ///
    /// Fails only if `path` does not parse.
    pub fn set_field_errors(&self, path: impl IntoFieldPath, errors: Vec<String>) -> Result<()> {
        let path = path.into_field_path()?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        let state = inner.registry.get_or_insert(&path);
        state.errors = errors;
        state.touched = true;
        inner.form.touched = true;
        inner.form.bump();
        Ok(())
    }
}

/// Reject document roots the path accessor cannot address.
fn check_document(document: &Value) -> Result<()> {
    match document {
        Value::Object(_) | Value::Array(_) => Ok(()),
        other => Err(FormError::InvalidDocument {
            found: formstate_model::json_type_name(other),
        }),
    }
}
