use std::collections::BTreeMap;

use formstate_core::{FieldState, FormController, FormState};
use serde::Serialize;
use serde_json::Value;

/// Final state of a replayed session.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub valid: bool,
    pub form: FormState,
    pub fields: Vec<FieldRow>,
    pub steps: Vec<StepResult>,
    /// Number of events emitted per kind.
    pub events: BTreeMap<String, usize>,
    pub document: Value,
}

impl ReplayReport {
    pub fn capture(
        form: &FormController,
        steps: Vec<StepResult>,
        events: BTreeMap<String, usize>,
    ) -> Self {
        let fields = form
            .fields()
            .into_iter()
            .map(|(path, state)| FieldRow::new(path.to_string(), &state))
            .collect();
        Self {
            valid: form.is_valid(),
            form: form.form_state(),
            fields,
            steps,
            events,
            document: form.document(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.fields.iter().map(|field| field.errors.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldRow {
    pub path: String,
    pub dirty: bool,
    pub touched: bool,
    pub validating: bool,
    pub errors: Vec<String>,
}

impl FieldRow {
    fn new(path: String, state: &FieldState) -> Self {
        Self {
            path,
            dirty: state.dirty,
            touched: state.touched,
            validating: state.validating,
            errors: state.errors.clone(),
        }
    }
}

/// What one step returned. Steps with no result (writes, focus, reset) carry
/// `None`.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}
