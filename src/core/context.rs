//! Mutable state of one upgrade session

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::project::{Project, Workspace};
use crate::telemetry::correlation::{self, PipelineSnapshot};

/// Key of the persistent solution identifier property.
pub const PERMANENT_SOLUTION_ID_KEY: &str = "PermanentSolutionId";

/// Context shared between startup actions and the command.
pub type SharedContext = Arc<tokio::sync::Mutex<UpgradeContext>>;

const COMPLETED_PREFIX: &str = "Completed:";

/// Named string properties, some of which survive across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStore {
    values: BTreeMap<String, (String, bool)>,
}

impl PropertyStore {
    pub fn set(&mut self, key: &str, value: &str, persistent: bool) {
        self.values
            .insert(key.to_string(), (value.to_string(), persistent));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|(value, _)| value.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(value, _)| value)
    }

    /// Properties flagged as persistent, in key order.
    pub fn persistent(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter(|(_, (_, persistent))| *persistent)
            .map(|(key, (value, _))| (key.as_str(), value.as_str()))
    }
}

/// Everything the pipeline knows about the workspace being upgraded.
///
/// Changes to the current project or step are published to the ambient
/// correlation slot of the calling task.
#[derive(Debug, Clone)]
pub struct UpgradeContext {
    root: PathBuf,
    projects: Vec<Project>,
    entry_points: Vec<Project>,
    current_project: Option<Project>,
    current_step: Option<String>,
    pub properties: PropertyStore,
}

impl UpgradeContext {
    pub fn new(root: impl Into<PathBuf>, projects: Vec<Project>) -> Self {
        let mut properties = PropertyStore::default();
        properties.set(
            PERMANENT_SOLUTION_ID_KEY,
            &uuid::Uuid::new_v4().to_string(),
            true,
        );

        Self {
            root: root.into(),
            projects,
            entry_points: Vec::new(),
            current_project: None,
            current_step: None,
            properties,
        }
    }

    pub fn from_workspace(workspace: Workspace) -> Self {
        let mut context = Self::new(workspace.root, workspace.projects);
        if let Some(requested) = workspace.requested {
            context.entry_points = vec![requested];
        }
        context
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Look up a project by its persisted identity.
    pub fn find_project(&self, identity: &str) -> Option<&Project> {
        if identity.is_empty() {
            return None;
        }
        self.projects.iter().find(|p| p.identity() == identity)
    }

    pub fn entry_points(&self) -> &[Project] {
        &self.entry_points
    }

    pub fn set_entry_points(&mut self, entry_points: Vec<Project>) {
        self.entry_points = entry_points;
        self.publish();
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current_project.as_ref()
    }

    pub fn set_current_project(&mut self, project: Option<Project>) {
        self.current_project = project;
        self.publish();
    }

    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    pub fn set_current_step(&mut self, step: Option<&str>) {
        self.current_step = step.map(str::to_string);
        self.publish();
    }

    pub fn solution_id(&self) -> String {
        self.root.display().to_string()
    }

    pub fn permanent_solution_id(&self) -> Option<&str> {
        self.properties.get(PERMANENT_SOLUTION_ID_KEY)
    }

    pub fn is_completed(&self, project: &Project) -> bool {
        self.properties.get(&completed_key(project)).is_some()
    }

    pub fn mark_completed(&mut self, project: &Project) {
        self.properties.set(&completed_key(project), "true", true);
    }

    /// Correlation ids for the current position in the pipeline.
    pub fn snapshot(&self) -> PipelineSnapshot {
        let entry_point = self
            .current_project
            .as_ref()
            .filter(|p| self.entry_points.contains(p))
            .or_else(|| self.entry_points.first());

        PipelineSnapshot {
            permanent_solution_id: self.permanent_solution_id().map(str::to_string),
            solution_id: Some(self.solution_id()),
            entry_point_id: entry_point.map(Project::identity),
            project_id: self.current_project.as_ref().map(Project::identity),
            step_id: self.current_step.clone(),
        }
    }

    /// Publish [`snapshot`](Self::snapshot) to the ambient slot.
    pub fn publish(&self) {
        correlation::set_current(Some(self.snapshot()));
    }
}

fn completed_key(project: &Project) -> String {
    format!("{}{}", COMPLETED_PREFIX, project.identity())
}
