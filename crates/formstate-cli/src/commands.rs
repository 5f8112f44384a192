use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use comfy_table::Table;
use formstate_core::{EventBus, FormController, access};
use formstate_model::json_type_name;
use formstate_validate::RuleValidator;
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span};

use crate::logging::redact_value;
use crate::script::{Script, SortKey, Step};
use crate::summary::apply_table_style;
use crate::types::{ReplayReport, StepResult};

/// Load and replay `path` on a fresh runtime.
pub fn run_replay(path: &Path) -> Result<ReplayReport> {
    let script = Script::load(path)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("start async runtime")?;
    runtime.block_on(replay(script))
}

pub fn run_paths(path: &Path) -> Result<()> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read document {}", path.display()))?;
    let document: Value =
        serde_json::from_str(&text).with_context(|| format!("parse document {}", path.display()))?;
    let mut table = Table::new();
    table.set_header(vec!["Path", "Type"]);
    apply_table_style(&mut table);
    for leaf in access::leaf_paths(&document) {
        let kind = access::get(&document, &leaf).map_or("missing", json_type_name);
        table.add_row(vec![leaf.to_string(), kind.to_string()]);
    }
    println!("{table}");
    Ok(())
}

/// Run every step of `script` against a new controller, then wait for
/// outstanding validations and capture the result.
pub async fn replay(script: Script) -> Result<ReplayReport> {
    let start = Instant::now();
    let Script {
        document,
        rules,
        config,
        steps,
    } = script;

    let events = EventBus::new();
    let counts = Arc::new(Mutex::new(BTreeMap::<String, usize>::new()));
    let sink = Arc::clone(&counts);
    events.on_any(move |event| {
        let mut counts = sink.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(event.kind().to_string()).or_default() += 1;
    });

    let mut builder = FormController::builder(document)
        .config(config)
        .event_bus(events);
    if let Some(rules) = rules {
        debug!(patterns = rules.len(), "using rule validator");
        builder = builder.validator(RuleValidator::new(rules));
    }
    let form = builder.build().context("build form controller")?;

    let total = steps.len();
    let mut results = Vec::with_capacity(total);
    for (index, step) in steps.into_iter().enumerate() {
        let op = step.name();
        let span = info_span!("step", index, op);
        let result = apply(&form, step)
            .instrument(span)
            .await
            .with_context(|| format!("step {index} ({op}) failed"))?;
        results.push(StepResult {
            step: index,
            op,
            result,
        });
    }
    form.settled().await;

    let counts = counts
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let report = ReplayReport::capture(&form, results, counts);
    info!(
        steps = total,
        fields = report.fields.len(),
        valid = report.valid,
        duration_ms = start.elapsed().as_millis(),
        "replay complete"
    );
    Ok(report)
}

async fn apply(form: &FormController, step: Step) -> Result<Option<Value>> {
    let result = match step {
        Step::Register { path } => {
            form.register(path)?;
            None
        }
        Step::Set { address, value } => {
            debug!(address = %address, value = %redact_value(&value), "write");
            form.write(&address, value)?;
            None
        }
        Step::Focus { path } => {
            form.focus(path)?;
            None
        }
        Step::Blur { path } => {
            form.blur(path)?;
            None
        }
        Step::Add { path, index, item } => {
            let index = index.unwrap_or(usize::MAX);
            Some(Value::Bool(form.add(path, index, item)?))
        }
        Step::Remove { path, index } => Some(form.remove(path, index)?.unwrap_or(Value::Null)),
        Step::Move { path, from, to } => Some(Value::Bool(form.move_item(path, from, to)?)),
        Step::Sort {
            path,
            key,
            descending,
        } => {
            let key = SortKey::new(key.as_deref(), descending)?;
            Some(Value::Bool(form.sort_by(path, |a, b| key.compare(a, b))?))
        }
        Step::Validate => Some(Value::Bool(form.validate().await)),
        Step::ValidateField { path } => Some(Value::Bool(form.validate_field(path).await?)),
        Step::Submit => Some(Value::Bool(form.submit().await)),
        Step::Reset => {
            form.reset();
            None
        }
        Step::Settle => {
            form.settled().await;
            None
        }
    };
    Ok(result)
}
