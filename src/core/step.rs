//! Upgrade steps and their registry

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::context::UpgradeContext;
use crate::core::project::Project;

/// Result of applying a step to one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Complete,
    Skipped(String),
}

/// One unit of upgrade work, applied per project.
#[async_trait]
pub trait UpgradeStep: Send + Sync {
    /// Stable identifier, also used as the correlation step id.
    fn id(&self) -> &str;

    fn title(&self) -> &str;

    async fn apply(
        &self,
        context: &mut UpgradeContext,
        project: &Project,
    ) -> anyhow::Result<StepOutcome>;
}

/// Steps in the order they run.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: Vec<Arc<dyn UpgradeStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, step: Arc<dyn UpgradeStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Arc<dyn UpgradeStep>] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id().to_string()).collect()
    }
}

/// Copies each project file to `<file>.bak` before it is touched.
pub struct BackupStep;

impl BackupStep {
    pub const ID: &'static str = "backup";

    pub fn backup_path(project: &Project) -> PathBuf {
        let mut path = project.path().as_os_str().to_owned();
        path.push(".bak");
        PathBuf::from(path)
    }
}

#[async_trait]
impl UpgradeStep for BackupStep {
    fn id(&self) -> &str {
        Self::ID
    }

    fn title(&self) -> &str {
        "Back up project"
    }

    async fn apply(
        &self,
        _context: &mut UpgradeContext,
        project: &Project,
    ) -> anyhow::Result<StepOutcome> {
        let target = Self::backup_path(project);
        if tokio::fs::try_exists(&target).await? {
            return Ok(StepOutcome::Skipped(format!(
                "backup already exists at {}",
                target.display()
            )));
        }

        tokio::fs::copy(project.path(), &target).await?;
        debug!(target = %target.display(), "backed up project");
        Ok(StepOutcome::Complete)
    }
}
