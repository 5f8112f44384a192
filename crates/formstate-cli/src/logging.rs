//! Logging infrastructure using `tracing` and `tracing-subscriber`.
//!
//! The libraries only emit `tracing` events; this module decides where they
//! go for the `formstate` binary.
//!
//! # Log Levels
//!
//! - `error`: validator faults, failed submit handlers
//! - `warn`: registry collisions, ignored writes
//! - `info`: submit and reset outcomes, replay progress
//! - `debug`: scheduling, no-op array edits, stale results
//! - `trace`: individual rule failures
//!
//! Document values are only logged with `--log-values`; otherwise
//! [`redact_value`] substitutes a placeholder.
//!
//! # Usage
//!
//! ```ignore
//! use formstate_cli::logging::{init_logging, LogConfig, LogFormat};
//!
//! let config = LogConfig {
//!     format: LogFormat::Json,
//!     ..LogConfig::default()
//! };
//! init_logging(&config).expect("init logging");
//! ```

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

static LOG_VALUES_ENABLED: AtomicBool = AtomicBool::new(false);

/// Placeholder used when value logging is disabled.
pub const REDACTED_VALUE: &str = "[REDACTED]";

/// Returns true if document values may be logged.
pub fn log_values_enabled() -> bool {
    LOG_VALUES_ENABLED.load(Ordering::Relaxed)
}

/// Render `value` for a log line, or a redaction token when value logging
/// is off.
pub fn redact_value(value: &Value) -> String {
    if log_values_enabled() {
        value.to_string()
    } else {
        REDACTED_VALUE.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Maximum level emitted by the formstate crates.
    pub level_filter: LevelFilter,
    /// Let `RUST_LOG` override `level_filter`.
    pub use_env_filter: bool,
    pub with_timestamps: bool,
    pub with_ansi: bool,
    pub format: LogFormat,
    /// Append to this file instead of writing to stderr.
    pub log_file: Option<PathBuf>,
    /// Whether document values may be logged.
    pub log_values: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, fields inline.
    #[default]
    Text,
    /// Newline-delimited JSON with step spans closed on completion.
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level_filter: LevelFilter::WARN,
            use_env_filter: true,
            with_timestamps: false,
            with_ansi: true,
            format: LogFormat::default(),
            log_file: None,
            log_values: false,
        }
    }
}

/// Install the global subscriber. Call once, before the first event.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    LOG_VALUES_ENABLED.store(config.log_values, Ordering::Release);
    let layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            output_layer(config, SharedWriter::new(file))
        }
        None => output_layer(config, io::stderr),
    };
    tracing_subscriber::registry()
        .with(layer)
        .with(build_env_filter(config))
        .init();
    Ok(())
}

/// The formatting layer for `config`, writing through `writer`.
pub fn output_layer<W>(config: &LogConfig, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(false);
    match (config.format, config.with_timestamps) {
        (LogFormat::Json, _) => layer.json().with_span_events(FmtSpan::CLOSE).boxed(),
        (LogFormat::Text, true) => layer.compact().with_ansi(config.with_ansi).boxed(),
        (LogFormat::Text, false) => layer
            .compact()
            .with_ansi(config.with_ansi)
            .without_time()
            .boxed(),
    }
}

/// Lets several writer handles share one sink, e.g. an appended log file.
#[derive(Debug)]
pub struct SharedWriter<W> {
    sink: Arc<Mutex<W>>,
}

impl<W> SharedWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

/// One borrowed handle; holds no lock between writes.
pub struct SharedHandle<W> {
    sink: Arc<Mutex<W>>,
}

impl<W> SharedHandle<W> {
    fn lock(&self) -> io::Result<MutexGuard<'_, W>> {
        self.sink
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))
    }
}

impl<W: Write> Write for SharedHandle<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl<'a, W: Write + 'a> MakeWriter<'a> for SharedWriter<W> {
    type Writer = SharedHandle<W>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedHandle {
            sink: Arc::clone(&self.sink),
        }
    }
}

/// Directives for the configured level. Dependencies stay at warn.
fn default_directives(level_filter: LevelFilter) -> String {
    let level = level_filter.to_string().to_lowercase();
    format!(
        "warn,formstate={level},formstate_cli={level},formstate_core={level},\
         formstate_model={level},formstate_validate={level}"
    )
}

fn build_env_filter(config: &LogConfig) -> EnvFilter {
    let directives = default_directives(config.level_filter);
    if config.use_env_filter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
    } else {
        EnvFilter::new(directives)
    }
}
