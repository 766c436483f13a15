//! Analytics configuration.

use std::path::PathBuf;

use crate::util::paths::user_profile_dir;

/// Names and identifiers the analytics client derives its files and
/// environment variables from.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// Product version, used to key cache and sentinel files
    pub product_version: String,
    /// Human-readable tool name, e.g. "Upgrade Assistant"
    pub display_name: String,
    /// Identifier of this process' session
    pub session_id: String,
    /// Where the sentinel and cache files live
    pub profile_dir: PathBuf,
    /// Link shown alongside the consent prompt
    pub details_link: String,
}

impl TelemetryOptions {
    /// Options for `display_name` at `product_version`, with a fresh session
    /// id and the default profile directory.
    pub fn new(display_name: impl Into<String>, product_version: impl Into<String>) -> Self {
        Self {
            product_version: product_version.into(),
            display_name: display_name.into(),
            session_id: uuid::Uuid::new_v4().to_string(),
            profile_dir: user_profile_dir(),
            details_link: String::new(),
        }
    }

    /// Use a different profile directory.
    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = dir.into();
        self
    }

    /// Display name with spaces removed.
    pub fn tool_name(&self) -> String {
        self.display_name.replace(' ', "")
    }

    /// Suffix of the first-use sentinel file.
    pub fn sentinel_suffix(&self) -> String {
        format!("{}FirstUseSentinel", self.tool_name())
    }

    /// Suffix of user-level cache files.
    pub fn user_level_cache_suffix(&self) -> String {
        format!("{}UserLevelCache", self.tool_name())
    }

    /// Environment variable that disables analytics.
    pub fn telemetry_optout_var(&self) -> String {
        format!("{}_TELEMETRY_OPTOUT", self.tool_name().to_uppercase())
    }

    /// Environment variable that skips the consent prompt.
    pub fn skip_first_time_var(&self) -> String {
        format!(
            "{}_SKIP_FIRST_TIME_EXPERIENCE",
            self.tool_name().to_uppercase()
        )
    }

    /// Prefix applied to every emitted event name.
    pub fn producer_namespace(&self) -> String {
        format!("dotnet/{}", self.tool_name().to_lowercase())
    }
}
