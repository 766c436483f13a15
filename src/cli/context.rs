//! Options passed to the upgrade command
//!
//! Bundles the global CLI flags into a single struct so the command wiring
//! doesn't need to know about clap.

use std::path::PathBuf;

/// Parsed `upgrade` invocation.
#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    /// Project file or workspace directory to upgrade
    pub project: PathBuf,
    /// Never prompt (`--non-interactive`)
    pub non_interactive: bool,
    /// Skip the backup step (`--skip-backup`)
    pub skip_backup: bool,
    /// Show verbose output (`--verbose`)
    pub verbose: bool,
}
