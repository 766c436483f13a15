//! User profile paths

use std::path::PathBuf;

/// Overrides the user profile directory when set.
pub const HOME_OVERRIDE_VAR: &str = "UPGRADE_ASSISTANT_HOME";

const PROFILE_DIR_NAME: &str = ".upgradeassistant";

/// Directory holding per-user state (first-use sentinel, cache files).
///
/// Resolution order: `UPGRADE_ASSISTANT_HOME`, then `$HOME` (or
/// `%USERPROFILE%`) joined with `.upgradeassistant`, then the system temp
/// directory as a last resort.
pub fn user_profile_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_OVERRIDE_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);

    home.join(PROFILE_DIR_NAME)
}
