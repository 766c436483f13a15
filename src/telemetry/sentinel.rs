//! First-use sentinel recording telemetry consent.

use std::path::{Path, PathBuf};

use super::options::TelemetryOptions;
use crate::util::env_var_as_bool;

/// Zero-length marker file whose presence records that the user agreed to
/// telemetry collection.
#[derive(Debug, Clone)]
pub struct FirstTimeUseNoticeSentinel {
    profile_dir: PathBuf,
    sentinel_path: PathBuf,
    skip_var: String,
}

impl FirstTimeUseNoticeSentinel {
    /// Sentinel at `<profile_dir>/<product_version>.<sentinel_suffix>`.
    pub fn new(options: &TelemetryOptions) -> Self {
        let file_name = format!(
            "{}.{}",
            options.product_version,
            options.sentinel_suffix()
        );
        Self {
            profile_dir: options.profile_dir.clone(),
            sentinel_path: options.profile_dir.join(file_name),
            skip_var: options.skip_first_time_var(),
        }
    }

    /// Location of the sentinel file.
    pub fn path(&self) -> &Path {
        &self.sentinel_path
    }

    /// Whether the consent prompt should be skipped entirely.
    pub fn skip_first_time_experience(&self) -> bool {
        env_var_as_bool(&self.skip_var, false)
    }

    /// Whether consent has been recorded.
    pub fn exists(&self) -> bool {
        self.sentinel_path.is_file()
    }

    /// Record consent.
    pub fn create_if_not_exists(&self) -> std::io::Result<()> {
        if self.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.profile_dir)?;
        std::fs::write(&self.sentinel_path, [])?;
        tracing::debug!(path = %self.sentinel_path.display(), "created first-use sentinel");
        Ok(())
    }
}
