//! CLI command implementations

pub mod upgrade;

pub use upgrade::{run_upgrade, UpgradeCommand};
