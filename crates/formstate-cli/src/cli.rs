//! CLI argument definitions for the formstate replay tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "formstate",
    version,
    about = "Replay scripted form sessions against a path-addressed form controller",
    long_about = "Replay scripted form sessions against a path-addressed form controller.\n\n\
                  A script holds an initial document, optional validation rules and\n\
                  controller config, and a list of steps (writes, focus/blur, array\n\
                  edits, validation, submit, reset). The final field state is printed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (text for humans, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Include document values in log output.
    ///
    /// Values are redacted by default since form documents often carry
    /// personal data.
    #[arg(long = "log-values", global = true)]
    pub log_values: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a session script and print the resulting field state.
    Replay(ReplayArgs),

    /// List every leaf path of a JSON document.
    Paths(PathsArgs),
}

#[derive(Parser)]
pub struct ReplayArgs {
    /// Path to the JSON session script.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Report format.
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: ReportFormatArg,
}

#[derive(Parser)]
pub struct PathsArgs {
    /// Path to a JSON document.
    #[arg(value_name = "DOCUMENT")]
    pub document: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportFormatArg {
    Table,
    Json,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}
