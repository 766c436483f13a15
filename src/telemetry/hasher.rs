//! One-way hashing of identifying strings.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Transforms arbitrary text into a privacy-preserving identifier.
pub trait StringHasher: Send + Sync {
    /// Hash `text`.
    fn hash(&self, text: &str) -> String;
}

/// Lowercase hex SHA-256 of the UTF-8 bytes.
///
/// The output must match other producers hashing the same input (the
/// machine id in particular), so the format is fixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl StringHasher for Sha256Hasher {
    fn hash(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Leaves registered step ids readable and hashes everything else.
#[derive(Debug, Clone, Default)]
pub struct KnownStepsHasher {
    known: HashSet<String>,
    inner: Sha256Hasher,
}

impl KnownStepsHasher {
    /// Build the allow-list once from the registered step ids.
    pub fn new<I, S>(step_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: step_ids.into_iter().map(Into::into).collect(),
            inner: Sha256Hasher,
        }
    }

    /// Whether `text` is a registered step id.
    pub fn is_known(&self, text: &str) -> bool {
        self.known.contains(text)
    }
}

impl StringHasher for KnownStepsHasher {
    fn hash(&self, text: &str) -> String {
        if self.is_known(text) {
            return text.to_string();
        }
        self.inner.hash(text)
    }
}
