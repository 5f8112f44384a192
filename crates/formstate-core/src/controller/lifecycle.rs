//! Submit and reset.

use serde_json::{Map, Value};
use tracing::{error, info};

use super::{FormController, SubmitHandler, submit_handler};
use crate::access;
use crate::events::EventPayload;

impl FormController {
    /// Touch every field, validate, and hand the document to the configured
    /// submit handler if it is valid.
    ///
    /// Emits `validation_error` when validation fails, `submit_error` when
    /// the handler fails and `submit_success` otherwise. A form without a
    /// handler submits successfully once it validates.
    pub async fn submit(&self) -> bool {
        let handler = self.shared.on_submit.clone();
        self.submit_inner(handler).await
    }

    /// [`FormController::submit`] with a one-off handler in place of the
    /// configured one.
    pub async fn submit_with<F, Fut>(&self, handler: F) -> bool
    where
        F: Fn(Value, FormController) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.submit_inner(Some(submit_handler(handler))).await
    }

    async fn submit_inner(&self, handler: Option<SubmitHandler>) -> bool {
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.form.submitting = true;
            for state in inner.registry.states_mut() {
                state.touched = true;
            }
            if !inner.registry.is_empty() {
                inner.form.touched = true;
            }
            inner.form.bump();
        }

        let submitted = if !self.validate().await {
            let errors = self.errors();
            info!(fields = errors.len(), "submit blocked by validation errors");
            self.emit(EventPayload::ValidationError { errors });
            false
        } else if let Some(handler) = handler {
            match handler(self.document(), self.clone()).await {
                Ok(()) => {
                    info!("form submitted");
                    self.emit(EventPayload::SubmitSuccess {
                        document: self.document(),
                    });
                    true
                }
                Err(err) => {
                    error!(error = %format!("{err:#}"), "submit handler failed");
                    self.emit(EventPayload::SubmitError {
                        message: format!("{err:#}"),
                    });
                    false
                }
            }
        } else {
            info!("form submitted without a handler");
            self.emit(EventPayload::SubmitSuccess {
                document: self.document(),
            });
            true
        };

        let mut inner = self.lock();
        inner.form.submitting = false;
        inner.form.bump();
        submitted
    }

    /// Restore the original document and clear all field metadata.
    ///
    /// Field identities survive. Records whose path no longer resolves in the
    /// restored document are dropped, pending validations are cancelled and
    /// the validator's own state is reset. Emits `form_reset`.
    pub fn reset(&self) {
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            restore(&mut inner.document, &self.shared.original);
            for state in inner.registry.states_mut() {
                state.clear();
            }
            let document = &inner.document;
            inner
                .registry
                .retain(|path, _| access::resolves(document, path));
            inner.form.dirty = false;
            inner.form.touched = false;
            inner.form.bump();
        }
        self.shared.debouncer.cancel_all();
        self.shared.path_debouncer.cancel_all();
        self.shared.validator.reset();
        info!(form = %self.id(), "form reset");
        self.emit(EventPayload::FormReset);
    }
}

/// Copy `original` over `current`. At the top level of an object, keys added
/// since construction are kept but emptied.
fn restore(current: &mut Value, original: &Value) {
    match (current, original) {
        (Value::Object(current), Value::Object(original)) => {
            let added: Map<String, Value> = current
                .iter()
                .filter(|(key, _)| !original.contains_key(*key))
                .map(|(key, value)| (key.clone(), access::empty_like(value)))
                .collect();
            *current = original.clone();
            current.extend(added);
        }
        (current, original) => *current = original.clone(),
    }
}
