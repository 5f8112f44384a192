//! Lifecycle event bus.
//!
//! The bus is the only way a rendering layer learns about state changes
//! without polling. Handlers run synchronously, in registration order, before
//! `emit` returns. `emit` works on a snapshot of the handler list, so handlers
//! may subscribe or unsubscribe while an event is being delivered; they must
//! not mutate the emitting controller.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use formstate_model::{FieldPath, FormId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FieldChanged,
    FieldFocused,
    FieldBlurred,
    SubmitSuccess,
    SubmitError,
    ValidationError,
    FormReset,
    FormInitialized,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        Self::FieldChanged,
        Self::FieldFocused,
        Self::FieldBlurred,
        Self::SubmitSuccess,
        Self::SubmitError,
        Self::ValidationError,
        Self::FormReset,
        Self::FormInitialized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldChanged => "field_changed",
            Self::FieldFocused => "field_focused",
            Self::FieldBlurred => "field_blurred",
            Self::SubmitSuccess => "submit_success",
            Self::SubmitError => "submit_error",
            Self::ValidationError => "validation_error",
            Self::FormReset => "form_reset",
            Self::FormInitialized => "form_initialized",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event data, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    FieldChanged { path: FieldPath, value: Value },
    FieldFocused { path: FieldPath },
    FieldBlurred { path: FieldPath },
    SubmitSuccess { document: Value },
    SubmitError { message: String },
    ValidationError { errors: BTreeMap<String, Vec<String>> },
    FormReset,
    FormInitialized { document: Value },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FieldChanged { .. } => EventKind::FieldChanged,
            Self::FieldFocused { .. } => EventKind::FieldFocused,
            Self::FieldBlurred { .. } => EventKind::FieldBlurred,
            Self::SubmitSuccess { .. } => EventKind::SubmitSuccess,
            Self::SubmitError { .. } => EventKind::SubmitError,
            Self::ValidationError { .. } => EventKind::ValidationError,
            Self::FormReset => EventKind::FormReset,
            Self::FormInitialized { .. } => EventKind::FormInitialized,
        }
    }
}

/// An event together with the form that emitted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormEvent {
    pub form: FormId,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl FormEvent {
    pub fn new(form: FormId, payload: EventPayload) -> Self {
        Self { form, payload }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Subscription handle returned by [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&FormEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
}

/// Typed publish/subscribe channel. Clones share the same subscriptions.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers();
        let counts: BTreeMap<&str, usize> = handlers
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    /// A private bus, typically one per controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide bus, for listeners observing several controllers.
    pub fn shared() -> Self {
        static SHARED: OnceLock<EventBus> = OnceLock::new();
        SHARED.get_or_init(EventBus::new).clone()
    }

    fn handlers(&self) -> std::sync::MutexGuard<'_, HashMap<EventKind, Vec<(HandlerId, Handler)>>> {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe to one kind of event.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&FormEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.handlers()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Subscribe one handler to every kind of event under a single id.
    pub fn on_any<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&FormEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        let handler: Handler = Arc::new(handler);
        let mut handlers = self.handlers();
        for kind in EventKind::ALL {
            handlers
                .entry(kind)
                .or_default()
                .push((id, Arc::clone(&handler)));
        }
        id
    }

    /// Unsubscribe. Returns whether the handler was registered for `kind`.
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut handlers = self.handlers();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(candidate, _)| *candidate != id);
        before != list.len()
    }

    /// Unsubscribe `id` from every kind.
    pub fn off_all(&self, id: HandlerId) -> bool {
        EventKind::ALL
            .iter()
            .fold(false, |removed, kind| self.off(*kind, id) || removed)
    }

    /// Deliver `event` to its subscribers, in registration order.
    pub fn emit(&self, event: &FormEvent) {
        let snapshot: Vec<Handler> = self
            .handlers()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();
        tracing::trace!(kind = %event.kind(), handlers = snapshot.len(), "emit");
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers().get(&kind).map_or(0, Vec::len)
    }

    /// Whether both handles point at the same bus.
    pub fn same_bus(&self, other: &EventBus) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_event() -> FormEvent {
        FormEvent::new(FormId::new(), EventPayload::FormReset)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.on(EventKind::FormReset, move |_| {
                seen.lock().unwrap().push(label);
            });
        }
        bus.emit(&reset_event());
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn off_removes_only_that_handler() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let a = {
            let count = Arc::clone(&count);
            bus.on(EventKind::FormReset, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        {
            let count = Arc::clone(&count);
            bus.on(EventKind::FormReset, move |_| {
                count.fetch_add(10, Ordering::SeqCst);
            });
        }
        assert!(bus.off(EventKind::FormReset, a));
        assert!(!bus.off(EventKind::FormReset, a));
        bus.emit(&reset_event());
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn other_kinds_are_not_delivered() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        bus.on(EventKind::SubmitSuccess, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&reset_event());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_subscribe_during_emit() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        bus.on(EventKind::FormReset, move |_| {
            inner_bus.on(EventKind::FormReset, |_| {});
        });
        bus.emit(&reset_event());
        assert_eq!(bus.handler_count(EventKind::FormReset), 2);
    }

    #[test]
    fn on_any_and_off_all() {
        let bus = EventBus::new();
        let id = bus.on_any(|_| {});
        assert_eq!(bus.handler_count(EventKind::FieldBlurred), 1);
        assert!(bus.off_all(id));
        assert_eq!(bus.handler_count(EventKind::FieldBlurred), 0);
    }

    #[test]
    fn shared_bus_is_a_singleton() {
        assert!(EventBus::shared().same_bus(&EventBus::shared()));
        assert!(!EventBus::new().same_bus(&EventBus::shared()));
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = FormEvent::new(
            FormId::new(),
            EventPayload::FieldBlurred {
                path: FieldPath::parse("email").unwrap(),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "field_blurred");
        assert_eq!(json["path"], "email");
    }
}
