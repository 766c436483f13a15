//! Domain errors of the upgrade pipeline

use thiserror::Error;

/// Recognized pipeline failures.
///
/// Anything that is not an `UpgradeError` is treated as unexpected by the
/// runner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpgradeError {
    /// An expected failure of the pipeline's own logic
    #[error("{0}")]
    Failed(String),

    /// Cooperative cancellation
    #[error("The operation was canceled")]
    Canceled,
}

impl UpgradeError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Find an `UpgradeError` anywhere in an error chain.
    pub fn find(error: &anyhow::Error) -> Option<&UpgradeError> {
        error.chain().find_map(|e| e.downcast_ref::<UpgradeError>())
    }
}
