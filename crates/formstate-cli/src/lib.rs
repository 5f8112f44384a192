//! CLI library components for the `formstate` replay tool.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod script;
pub mod summary;
pub mod types;
