//! User-level cache for expensive, stable facts.
//!
//! One file per (product version, cache key) under the profile directory,
//! holding the raw value with no envelope.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::options::TelemetryOptions;

/// Errors raised while persisting a cache entry
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Reads and writes cache files under the user profile directory.
#[derive(Debug, Clone)]
pub struct UserLevelCacheWriter {
    profile_dir: PathBuf,
    product_version: String,
    suffix: String,
}

impl UserLevelCacheWriter {
    /// Cache writer for the given options.
    pub fn new(options: &TelemetryOptions) -> Self {
        Self {
            profile_dir: options.profile_dir.clone(),
            product_version: options.product_version.clone(),
            suffix: options.user_level_cache_suffix(),
        }
    }

    /// `<profile>/<productVersion>_<cacheKey>.<suffix>`
    pub fn cache_file_path(&self, cache_key: &str) -> PathBuf {
        self.profile_dir.join(format!(
            "{}_{}.{}",
            self.product_version, cache_key, self.suffix
        ))
    }

    /// Return the cached value for `cache_key`, computing and persisting it
    /// on a miss.
    ///
    /// An existing cache file is returned verbatim without recomputation.
    /// If the cache cannot be read or written the freshly computed value is
    /// returned uncached.
    pub fn run_with_cache<F>(&self, cache_key: &str, compute: F) -> String
    where
        F: FnOnce() -> String,
    {
        let path = self.cache_file_path(cache_key);

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(value) => return value,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "cache read failed");
                    return compute();
                }
            }
        }

        let value = compute();
        if let Err(e) = self.persist(&path, &value) {
            debug!(error = %e, "value computed but not cached");
        }
        value
    }

    fn persist(&self, path: &Path, value: &str) -> Result<(), CacheError> {
        if !self.profile_dir.is_dir() {
            std::fs::create_dir_all(&self.profile_dir).map_err(|source| CacheError::CreateDir {
                path: self.profile_dir.clone(),
                source,
            })?;
        }
        std::fs::write(path, value).map_err(|source| CacheError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
