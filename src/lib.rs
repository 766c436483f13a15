//! upgrade-assistant - resumable project upgrade pipeline
//!
//! A pipeline that walks a workspace's projects through a sequence of
//! upgrade steps, checkpointing progress so an interrupted run resumes where
//! it stopped, and reporting usage analytics without ever blocking or
//! failing the upgrade.

pub mod cli;
pub mod core;
pub mod telemetry;
pub mod util;

pub use crate::core::{UpgradeContext, UpgradeError};
pub use crate::telemetry::Telemetry;
