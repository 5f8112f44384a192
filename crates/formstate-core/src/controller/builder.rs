use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};

use formstate_model::{FormId, FormState, Result};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::info;

use super::{FormController, FormInner, Shared, SubmitHandler, check_document, submit_handler};
use crate::config::ControllerConfig;
use crate::debounce::Debouncer;
use crate::events::{EventBus, EventPayload};
use crate::registry::FieldRegistry;
use crate::validator::{NoopValidator, Validator};

/// Builder for [`FormController`].
pub struct FormBuilder {
    document: Value,
    config: ControllerConfig,
    validator: Option<Arc<dyn Validator>>,
    events: Option<EventBus>,
    on_submit: Option<SubmitHandler>,
}

impl FormBuilder {
    pub(super) fn new(document: Value) -> Self {
        Self {
            document,
            config: ControllerConfig::default(),
            validator: None,
            events: None,
            on_submit: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Use a validator that is also held elsewhere.
    #[must_use]
    pub fn shared_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Publish on `bus` instead of a private one.
    #[must_use]
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    #[must_use]
    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value, FormController) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_submit = Some(submit_handler(handler));
        self
    }

    /// Create the controller and emit `form_initialized`.
    ///
    /// # Errors
    ///
    /// Returns [`formstate_model::FormError::InvalidDocument`] if the root is
    /// not an object or an array.
    pub fn build(self) -> Result<FormController> {
        check_document(&self.document)?;
        let debounce = self.config.debounce();
        let controller = FormController {
            shared: Arc::new(Shared {
                id: FormId::new(),
                config: self.config,
                validator: self
                    .validator
                    .unwrap_or_else(|| Arc::new(NoopValidator) as Arc<dyn Validator>),
                events: self.events.unwrap_or_default(),
                on_submit: self.on_submit,
                original: self.document.clone(),
                debouncer: Debouncer::new(debounce),
                path_debouncer: Debouncer::new(debounce),
                scheduled: AtomicUsize::new(0),
                idle: Notify::new(),
                state: Mutex::new(FormInner {
                    document: self.document.clone(),
                    registry: FieldRegistry::new(),
                    form: FormState::default(),
                }),
            }),
        };
        info!(form = %controller.id(), "form initialized");
        controller.emit(EventPayload::FormInitialized {
            document: self.document,
        });
        Ok(controller)
    }
}
