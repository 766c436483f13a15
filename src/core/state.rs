//! Checkpoint persistence for resumable upgrades.
//!
//! The checkpoint lives at `<workspace-root>/.upgrade-assistant` and records
//! projects by file name only, so it stays valid when the workspace is
//! checked out somewhere else.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::context::UpgradeContext;
use crate::core::project::Project;

/// File name of the checkpoint inside the workspace root.
pub const STATE_FILE_NAME: &str = ".upgrade-assistant";

/// Errors raised while saving a checkpoint
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to write upgrade progress: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to serialize upgrade progress: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// On-disk checkpoint format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgradeState {
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub current_project: Option<String>,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Loads and saves pipeline progress.
#[async_trait]
pub trait StateManager: Send + Sync {
    /// Rehydrate `context` from the last checkpoint, if one is usable.
    ///
    /// Unreadable checkpoints are logged and ignored.
    async fn load_state(&self, context: &mut UpgradeContext);

    /// Overwrite the checkpoint with a full snapshot of `context`.
    async fn save_state(&self, context: &UpgradeContext) -> Result<(), StateError>;
}

/// JSON checkpoint stored in the workspace root.
pub struct FileStateManager {
    path: PathBuf,
    build: String,
}

impl FileStateManager {
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            path: workspace_root.join(STATE_FILE_NAME),
            build: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = build.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_state(&self) -> Option<UpgradeState> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!(path = %self.path.display(), "no upgrade progress found");
            return None;
        }

        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read upgrade progress");
                return None;
            }
        };

        match serde_json::from_slice::<Option<UpgradeState>>(&content) {
            Ok(Some(state)) => Some(state),
            Ok(None) => {
                warn!(path = %self.path.display(), "Upgrade progress file was empty");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not parse upgrade progress");
                None
            }
        }
    }
}

fn resolve(context: &UpgradeContext, identity: &str) -> Option<Project> {
    let project = context.find_project(identity).cloned();
    if project.is_none() && !identity.is_empty() {
        debug!(identity, "dropping project no longer in workspace");
    }
    project
}

#[async_trait]
impl StateManager for FileStateManager {
    async fn load_state(&self, context: &mut UpgradeContext) {
        let Some(state) = self.read_state().await else {
            return;
        };
        debug!(build = %state.build, "restoring upgrade progress");

        let entry_points: Vec<Project> = state
            .entry_points
            .iter()
            .filter_map(|identity| resolve(context, identity))
            .collect();
        let current = state
            .current_project
            .as_deref()
            .and_then(|identity| resolve(context, identity));

        for (key, value) in &state.properties {
            context.properties.set(key, value, true);
        }
        context.set_entry_points(entry_points);
        context.set_current_project(current);
    }

    async fn save_state(&self, context: &UpgradeContext) -> Result<(), StateError> {
        let state = UpgradeState {
            build: self.build.clone(),
            current_project: Some(
                context
                    .current_project()
                    .map(Project::identity)
                    .unwrap_or_default(),
            ),
            entry_points: context.entry_points().iter().map(Project::identity).collect(),
            properties: context
                .properties
                .persistent()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        let json = serde_json::to_string_pretty(&state)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "saved upgrade progress");
        Ok(())
    }
}
