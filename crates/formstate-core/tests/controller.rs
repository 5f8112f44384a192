use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use formstate_core::{
    ControllerConfig, EventBus, EventKind, EventPayload, FieldPath, FormController, FormError,
    MetaKey, MetaValue, Validator, ValidatorError, access,
};
use serde_json::{Value, json};

/// Marks listed paths as required; optionally sleeps before answering.
#[derive(Default)]
struct RequiredFields {
    required: Vec<FieldPath>,
    dependents: Vec<(FieldPath, FieldPath)>,
    delay: Option<Duration>,
    /// Per-call delays, used before falling back to `delay`.
    delays: Mutex<VecDeque<Duration>>,
    calls: AtomicUsize,
    errors: Mutex<BTreeMap<String, Vec<String>>>,
}

impl RequiredFields {
    fn new(paths: &[&str]) -> Self {
        Self {
            required: paths.iter().map(|p| FieldPath::parse(p).unwrap()).collect(),
            ..Default::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_delays(self, millis: &[u64]) -> Self {
        *self.delays.lock().unwrap() = millis.iter().copied().map(Duration::from_millis).collect();
        self
    }

    fn with_dependent(mut self, source: &str, dependent: &str) -> Self {
        self.dependents.push((
            FieldPath::parse(source).unwrap(),
            FieldPath::parse(dependent).unwrap(),
        ));
        self
    }
}

#[async_trait]
impl Validator for RequiredFields {
    async fn validate(&self, document: &Value) -> Result<bool, ValidatorError> {
        let mut valid = true;
        for path in &self.required {
            valid &= self.validate_path(path, document).await?;
        }
        Ok(valid)
    }

    async fn validate_path(&self, path: &FieldPath, document: &Value) -> Result<bool, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().pop_front().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let missing = self.required.contains(path)
            && access::get(document, path).is_none_or(|v| v.is_null() || v == "");
        let mut errors = self.errors.lock().unwrap();
        if missing {
            errors.insert(path.to_string(), vec![format!("{path} is required")]);
        } else {
            errors.remove(&path.to_string());
        }
        Ok(!missing)
    }

    fn errors(&self) -> BTreeMap<String, Vec<String>> {
        self.errors.lock().unwrap().clone()
    }

    fn errors_for_path(&self, path: &FieldPath) -> Vec<String> {
        self.errors
            .lock()
            .unwrap()
            .get(&path.to_string())
            .cloned()
            .unwrap_or_default()
    }

    fn dependent_fields(&self, path: &FieldPath) -> Vec<FieldPath> {
        self.dependents
            .iter()
            .filter(|(source, _)| source == path)
            .map(|(_, dependent)| dependent.clone())
            .collect()
    }

    fn clear_errors_for_path(&self, path: &FieldPath) {
        self.errors.lock().unwrap().remove(&path.to_string());
    }

    fn reset(&self) {
        self.errors.lock().unwrap().clear();
    }
}

struct Faulty;

#[async_trait]
impl Validator for Faulty {
    async fn validate(&self, _document: &Value) -> Result<bool, ValidatorError> {
        Err(ValidatorError::Unavailable("offline".into()))
    }

    async fn validate_path(&self, _path: &FieldPath, _document: &Value) -> Result<bool, ValidatorError> {
        Err(ValidatorError::Unavailable("offline".into()))
    }

    fn errors(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }

    fn errors_for_path(&self, _path: &FieldPath) -> Vec<String> {
        Vec::new()
    }

    fn dependent_fields(&self, _path: &FieldPath) -> Vec<FieldPath> {
        Vec::new()
    }

    fn clear_errors_for_path(&self, _path: &FieldPath) {}

    fn reset(&self) {}
}

fn record(bus: &EventBus) -> Arc<Mutex<Vec<EventPayload>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.on_any(move |event| sink.lock().unwrap().push(event.payload.clone()));
    seen
}

fn kinds(seen: &Arc<Mutex<Vec<EventPayload>>>) -> Vec<EventKind> {
    seen.lock().unwrap().iter().map(EventPayload::kind).collect()
}

fn manual(document: Value) -> FormController {
    FormController::builder(document)
        .config(ControllerConfig::manual())
        .build()
        .unwrap()
}

#[test]
fn rejects_scalar_documents() {
    let err = FormController::new(json!("text")).unwrap_err();
    assert_eq!(err, FormError::InvalidDocument { found: "string" });
    assert!(FormController::new(json!([])).is_ok());
}

#[test]
fn read_after_write_creates_containers() {
    let form = FormController::new(json!({})).unwrap();
    form.write("user.tags.1", json!("b")).unwrap();
    assert_eq!(form.read("user.tags.1").unwrap(), json!("b"));
    assert_eq!(form.document(), json!({"user": {"tags": [null, "b"]}}));
    assert_eq!(form.read("user.missing").unwrap(), Value::Null);
}

#[test]
fn writes_mark_registered_fields_dirty() {
    let form = manual(json!({"name": ""}));
    form.register("name").unwrap();
    let before = form.version();
    form.write("name", json!("Ada")).unwrap();
    form.write("other", json!(1)).unwrap();

    assert!(form.field_state("name").unwrap().unwrap().dirty);
    assert!(form.field_state("other").unwrap().is_none());
    assert!(form.form_state().dirty);
    assert!(form.version() > before);
}

#[test]
fn far_out_index_writes_are_ignored() {
    let form = manual(json!({"items": []}));
    let before = form.version();
    form.write("items.18446744073709551615", json!(1)).unwrap();
    form.write("items.4000000000.name", json!("x")).unwrap();

    assert_eq!(form.document(), json!({"items": []}));
    assert_eq!(form.version(), before);
    assert!(!form.form_state().dirty);
}

#[test]
fn leading_zero_segments_are_object_keys() {
    let form = manual(json!({"codes": {"01": "x"}}));
    assert_eq!(form.read("codes.01").unwrap(), json!("x"));
    form.write("codes.01", json!("y")).unwrap();
    assert_eq!(form.document(), json!({"codes": {"01": "y"}}));
}

#[test]
fn metadata_addresses() {
    let form = manual(json!({"email": ""}));
    assert_eq!(form.read("email.$isTouched").unwrap(), json!(false));
    form.write("email.$isTouched", json!(true)).unwrap();
    assert!(form.form_state().touched);
    form.write("email.$errors", json!(["taken"])).unwrap();
    assert_eq!(form.read("email.$errors").unwrap(), json!(["taken"]));
    assert!(!form.is_valid());

    let err = form.write("email.$errors", json!(5)).unwrap_err();
    assert!(matches!(err, FormError::MetaTypeMismatch { key: MetaKey::Errors, .. }));
    assert!(matches!(
        form.read("email.$focused"),
        Err(FormError::UnknownMeta { .. })
    ));
    assert!(
        !form
            .write_meta("email", MetaKey::IsTouched, MetaValue::Flag(true))
            .unwrap()
    );
}

#[test]
fn events_follow_lifecycle() {
    let bus = EventBus::new();
    let seen = record(&bus);
    let form = FormController::builder(json!({"name": ""}))
        .config(ControllerConfig::manual())
        .event_bus(bus)
        .build()
        .unwrap();

    form.focus("name").unwrap();
    form.write("name", json!("Ada")).unwrap();
    form.blur("name").unwrap();
    form.reset();

    assert_eq!(
        kinds(&seen),
        vec![
            EventKind::FormInitialized,
            EventKind::FieldFocused,
            EventKind::FieldChanged,
            EventKind::FieldBlurred,
            EventKind::FormReset,
        ]
    );
    assert!(form.field_state("name").unwrap().is_some_and(|s| !s.touched));
}

#[test]
fn handlers_may_read_the_form_during_emit() {
    let bus = EventBus::new();
    let form = FormController::builder(json!({"n": 0}))
        .event_bus(bus.clone())
        .config(ControllerConfig::manual())
        .build()
        .unwrap();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let handle = form.clone();
    let sink = Arc::clone(&observed);
    bus.on(EventKind::FieldChanged, move |_| {
        sink.lock().unwrap().push(handle.read("n").unwrap());
    });

    form.write("n", json!(1)).unwrap();
    form.write("n", json!(2)).unwrap();
    assert_eq!(*observed.lock().unwrap(), vec![json!(1), json!(2)]);
}

#[test]
fn add_shifts_metadata_of_later_elements() {
    let form = manual(json!({"items": [{"name": "a"}, {"name": "b"}]}));
    let first = form.register("items.0.name").unwrap();
    let second = form.register("items.1.name").unwrap();
    form.write("items.1.name.$isTouched", json!(true)).unwrap();

    assert!(form.add("items", 0, json!({"name": "new"})).unwrap());

    assert!(form.field_state("items.0.name").unwrap().is_none());
    assert_eq!(form.path_of(first).unwrap().to_string(), "items.1.name");
    assert_eq!(form.path_of(second).unwrap().to_string(), "items.2.name");
    assert_eq!(form.read("items.2.name.$isTouched").unwrap(), json!(true));
    assert_eq!(form.read("items.0.name").unwrap(), json!("new"));
}

#[test]
fn add_clamps_index_and_creates_missing_arrays() {
    let form = manual(json!({"tags": ["a"]}));
    form.add("tags", 99, json!("b")).unwrap();
    form.add("fresh", 0, json!(1)).unwrap();
    assert!(!form.add("tags.0", 0, json!("x")).unwrap());
    assert_eq!(form.document(), json!({"tags": ["a", "b"], "fresh": [1]}));
}

#[test]
fn remove_drops_metadata_and_closes_gap() {
    let form = manual(json!({"items": ["a", "b", "c"]}));
    let a = form.register("items.0").unwrap();
    let b = form.register("items.1").unwrap();
    let c = form.register("items.2").unwrap();

    assert_eq!(form.remove("items", 1).unwrap(), Some(json!("b")));
    assert_eq!(form.remove("items", 7).unwrap(), None);

    assert_eq!(form.read("items").unwrap(), json!(["a", "c"]));
    assert_eq!(form.path_of(a).unwrap().to_string(), "items.0");
    assert!(form.path_of(b).is_none());
    assert_eq!(form.path_of(c).unwrap().to_string(), "items.1");
}

#[test]
fn move_keeps_identity_with_element() {
    let form = manual(json!({"items": ["a", "b", "c", "d"]}));
    let ids: Vec<_> = (0..4)
        .map(|i| form.register(format!("items.{i}")).unwrap())
        .collect();

    assert!(form.move_item("items", 0, 2).unwrap());
    assert_eq!(form.read("items").unwrap(), json!(["b", "c", "a", "d"]));
    assert_eq!(form.path_of(ids[0]).unwrap().to_string(), "items.2");
    assert_eq!(form.path_of(ids[1]).unwrap().to_string(), "items.0");

    assert!(form.move_item("items", 3, 0).unwrap());
    assert_eq!(form.read("items").unwrap(), json!(["d", "b", "c", "a"]));
    assert_eq!(form.path_of(ids[3]).unwrap().to_string(), "items.0");

    assert!(!form.move_item("items", 9, 0).unwrap());
    assert!(!form.move_item("items", 1, 1).unwrap());
}

#[test]
fn sort_moves_metadata_with_elements() {
    let form = manual(json!({"people": [{"age": 40}, {"age": 20}, {"age": 30}]}));
    let ids: Vec<_> = (0..3)
        .map(|i| form.register(format!("people.{i}.age")).unwrap())
        .collect();
    form.write("people.0.age.$errors", json!(["too old"])).unwrap();

    let sorted = form
        .sort_by("people", |a, b| {
            a["age"].as_i64().cmp(&b["age"].as_i64())
        })
        .unwrap();

    assert!(sorted);
    assert_eq!(
        form.read("people").unwrap(),
        json!([{"age": 20}, {"age": 30}, {"age": 40}])
    );
    assert_eq!(form.path_of(ids[0]).unwrap().to_string(), "people.2.age");
    assert_eq!(form.read("people.2.age.$errors").unwrap(), json!(["too old"]));
    assert!(!form.sort_by("people", |a, b| a["age"].as_i64().cmp(&b["age"].as_i64())).unwrap());
}

#[test]
fn reset_restores_document_and_is_idempotent() {
    let form = manual(json!({"name": "Ada", "items": ["x"]}));
    let id = form.register("items.0").unwrap();
    form.write("name", json!("Bob")).unwrap();
    form.write("added", json!({"deep": 1})).unwrap();
    form.add("items", 1, json!("y")).unwrap();
    form.register("items.1").unwrap();
    form.blur("items.0").unwrap();

    form.reset();
    let once = (form.document(), form.fields(), form.form_state().dirty);
    form.reset();
    let twice = (form.document(), form.fields(), form.form_state().dirty);

    assert_eq!(once, twice);
    assert_eq!(
        form.document(),
        json!({"name": "Ada", "items": ["x"], "added": {}})
    );
    assert_eq!(form.field_state("items.0").unwrap().unwrap().id, id);
    assert!(form.field_state("items.1").unwrap().is_none());
    assert!(!form.form_state().touched);
}

#[test]
fn set_errors_marks_fields_touched() {
    let form = manual(json!({"a": 1, "b": 2}));
    let mut errors = BTreeMap::new();
    errors.insert("a".to_string(), vec!["server says no".to_string()]);
    form.set_errors(errors).unwrap();

    let state = form.field_state("a").unwrap().unwrap();
    assert!(state.touched);
    assert_eq!(form.errors().len(), 1);

    let mut bad = BTreeMap::new();
    bad.insert("a..b".to_string(), vec![]);
    assert!(form.set_errors(bad).is_err());
}

#[test]
fn writes_without_a_runtime_skip_validation() {
    let form = FormController::builder(json!({"name": ""}))
        .validator(RequiredFields::new(&["name"]))
        .build()
        .unwrap();
    form.register("name").unwrap();
    form.write("name", json!("")).unwrap();
    assert!(form.is_valid());
}

#[tokio::test]
async fn validate_field_marks_and_reports() {
    let form = FormController::builder(json!({"name": ""}))
        .config(ControllerConfig::manual())
        .validator(RequiredFields::new(&["name"]))
        .build()
        .unwrap();

    assert!(!form.validate_field("name").await.unwrap());
    let state = form.field_state("name").unwrap().unwrap();
    assert!(state.dirty && state.touched && !state.validating);
    assert_eq!(state.errors, vec!["name is required".to_string()]);
    assert!(!form.form_state().is_validating());
}

#[tokio::test]
async fn validate_covers_registered_fields_only() {
    let form = FormController::builder(json!({"a": "", "b": ""}))
        .config(ControllerConfig::manual())
        .validator(RequiredFields::new(&["a", "b"]))
        .build()
        .unwrap();
    form.register("a").unwrap();

    assert!(!form.validate().await);
    assert_eq!(form.errors().keys().collect::<Vec<_>>(), vec!["a"]);
    assert!(!form.field_state("a").unwrap().unwrap().touched);
}

#[tokio::test]
async fn validator_faults_count_as_invalid() {
    let form = FormController::builder(json!({"name": "x"}))
        .config(ControllerConfig::manual())
        .validator(Faulty)
        .build()
        .unwrap();
    assert!(!form.validate_field("name").await.unwrap());
    assert_eq!(
        form.read("name.$errors").unwrap(),
        json!(["Validator unavailable: offline"])
    );
}

#[tokio::test(start_paused = true)]
async fn input_validation_is_debounced() {
    let validator = Arc::new(RequiredFields::new(&["name"]));
    let form = FormController::builder(json!({"name": ""}))
        .config(ControllerConfig {
            debounce_ms: 100,
            ..ControllerConfig::default()
        })
        .shared_validator(validator.clone())
        .build()
        .unwrap();
    form.register("name").unwrap();

    form.write("name", json!("A")).unwrap();
    form.write("name", json!("")).unwrap();
    form.write("name", json!("Ad")).unwrap();
    form.settled().await;

    assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    assert!(form.is_valid());
}

#[tokio::test(start_paused = true)]
async fn unregistered_writes_do_not_validate() {
    let validator = Arc::new(RequiredFields::new(&["name"]));
    let form = FormController::builder(json!({}))
        .shared_validator(validator.clone())
        .build()
        .unwrap();
    form.write("name", json!("")).unwrap();
    form.settled().await;
    assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
    assert!(form.field_state("name").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn unregistered_writes_revalidate_touched_dependents() {
    let validator = Arc::new(RequiredFields::new(&["confirm"]).with_dependent("password", "confirm"));
    let form = FormController::builder(json!({"confirm": "x"}))
        .shared_validator(validator.clone())
        .build()
        .unwrap();
    form.register("confirm").unwrap();
    form.set_field_errors("confirm", vec!["does not match".into()]).unwrap();

    form.write("password", json!("x")).unwrap();
    form.write("password", json!("xy")).unwrap();
    form.settled().await;

    assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    assert!(form.field_state("confirm").unwrap().unwrap().is_valid());
    assert!(form.field_state("password").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn blur_validates_and_cascades_to_touched_dependents() {
    let validator = Arc::new(RequiredFields::new(&["a", "b"]).with_dependent("a", "b"));
    let form = FormController::builder(json!({"a": "", "b": ""}))
        .config(ControllerConfig {
            debounce_ms: 10,
            ..ControllerConfig::default()
        })
        .shared_validator(validator.clone())
        .build()
        .unwrap();

    form.blur("b").unwrap();
    form.settled().await;
    assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(form.errors().len(), 1);

    form.register("a").unwrap();
    form.write("a", json!("x")).unwrap();
    form.settled().await;

    // `a` itself, then the touched dependent `b`.
    assert_eq!(validator.calls.load(Ordering::SeqCst), 3);
    assert!(form.field_state("a").unwrap().unwrap().is_valid());
    assert!(!form.field_state("b").unwrap().unwrap().is_valid());
}

#[tokio::test(start_paused = true)]
async fn stale_results_are_dropped_after_reset() {
    let form = FormController::builder(json!({"name": ""}))
        .config(ControllerConfig::manual())
        .validator(RequiredFields::new(&["name"]).with_delay(Duration::from_millis(100)))
        .build()
        .unwrap();
    form.register("name").unwrap();

    let running = tokio::spawn({
        let form = form.clone();
        async move { form.validate_field("name").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(form.read("name.$isValidating").unwrap(), json!(true));
    form.reset();

    assert!(!running.await.unwrap().unwrap());
    let state = form.field_state("name").unwrap().unwrap();
    assert!(state.errors.is_empty());
    assert!(!state.validating);
    assert!(!form.form_state().is_validating());
}

#[tokio::test(start_paused = true)]
async fn removal_during_validation_is_tolerated() {
    let form = FormController::builder(json!({"items": [{"name": ""}]}))
        .config(ControllerConfig::manual())
        .validator(RequiredFields::new(&["items.0.name"]).with_delay(Duration::from_millis(100)))
        .build()
        .unwrap();
    form.register("items.0.name").unwrap();

    let running = tokio::spawn({
        let form = form.clone();
        async move { form.validate_field("items.0.name").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(form.form_state().validating, 1);
    assert_eq!(form.remove("items", 0).unwrap(), Some(json!({"name": ""})));

    // The verdict is still returned; it just has nowhere to land.
    assert!(!running.await.unwrap().unwrap());
    assert!(form.field_state("items.0.name").unwrap().is_none());
    assert!(form.fields().is_empty());
    assert_eq!(form.form_state().validating, 0);
    assert!(form.is_valid());
}

#[tokio::test(start_paused = true)]
async fn newest_validation_wins_when_an_older_one_resolves_last() {
    let form = FormController::builder(json!({"name": ""}))
        .config(ControllerConfig::manual())
        .validator(RequiredFields::new(&["name"]).with_delays(&[100, 10]))
        .build()
        .unwrap();
    form.register("name").unwrap();

    let older = tokio::spawn({
        let form = form.clone();
        async move { form.validate_field("name").await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    form.write("name", json!("Ada")).unwrap();
    let newer = tokio::spawn({
        let form = form.clone();
        async move { form.validate_field("name").await }
    });

    assert!(newer.await.unwrap().unwrap());
    assert_eq!(form.form_state().validating, 1);
    assert!(!older.await.unwrap().unwrap());

    let state = form.field_state("name").unwrap().unwrap();
    assert!(state.errors.is_empty());
    assert!(!state.validating);
    assert_eq!(form.form_state().validating, 0);
}

#[tokio::test]
async fn submit_blocked_by_errors() {
    let bus = EventBus::new();
    let seen = record(&bus);
    let form = FormController::builder(json!({"name": ""}))
        .config(ControllerConfig::manual())
        .validator(RequiredFields::new(&["name"]))
        .event_bus(bus)
        .on_submit(|_, _| async { Err(anyhow::anyhow!("must not run")) })
        .build()
        .unwrap();
    form.register("name").unwrap();

    assert!(!form.submit().await);
    assert!(form.field_state("name").unwrap().unwrap().touched);
    assert!(!form.form_state().submitting);
    let events = seen.lock().unwrap();
    let Some(EventPayload::ValidationError { errors }) = events.last() else {
        panic!("expected validation_error, got {events:?}");
    };
    assert_eq!(errors["name"], vec!["name is required".to_string()]);
}

#[tokio::test]
async fn submit_runs_handler_with_document() {
    let received = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&received);
    let form = FormController::builder(json!({"name": "Ada"}))
        .config(ControllerConfig::manual())
        .validator(RequiredFields::new(&["name"]))
        .on_submit(move |document, _| {
            let sink = Arc::clone(&sink);
            async move {
                *sink.lock().unwrap() = Some(document);
                anyhow::Ok(())
            }
        })
        .build()
        .unwrap();
    form.register("name").unwrap();

    assert!(form.submit().await);
    assert_eq!(*received.lock().unwrap(), Some(json!({"name": "Ada"})));
}

#[tokio::test]
async fn submit_handler_errors_are_reported() {
    let bus = EventBus::new();
    let seen = record(&bus);
    let form = FormController::builder(json!({"name": "Ada"}))
        .event_bus(bus)
        .build()
        .unwrap();

    let ok = form
        .submit_with(|_, form| async move {
            form.set_field_errors("name", vec!["taken".into()])?;
            Err::<(), _>(anyhow::anyhow!("server rejected"))
        })
        .await;

    assert!(!ok);
    assert_eq!(form.read("name.$errors").unwrap(), json!(["taken"]));
    let events = seen.lock().unwrap();
    assert_eq!(
        events.last(),
        Some(&EventPayload::SubmitError {
            message: "server rejected".into()
        })
    );
}

#[tokio::test]
async fn submit_without_handler_succeeds() {
    let form = FormController::new(json!({"x": 1})).unwrap();
    assert!(form.submit().await);
}
