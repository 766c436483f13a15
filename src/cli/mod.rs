//! CLI layer
//!
//! Process-level orchestration: the pipeline runner, its startup actions,
//! the upgrade command, and console output.

pub mod commands;
pub mod context;
pub mod output;
pub mod runner;
pub mod startup;

pub use context::UpgradeOptions;
pub use output::Output;
pub use runner::{AppCommand, ApplicationLifetime, ExitCode, PipelineRunner, UpgradeStartup};
pub use startup::{used_symbols, UsedSymbol};
