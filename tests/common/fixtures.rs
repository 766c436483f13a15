//! Test fixtures for creating workspaces and analytics clients.
//!
//! Provides a `WorkspaceBuilder` pattern for creating temporary workspaces
//! with project files, plus a consenting profile directory for analytics.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use upgrade_assistant::core::state::{UpgradeState, STATE_FILE_NAME};
use upgrade_assistant::telemetry::{
    FirstTimeUseNoticeSentinel, PropertyBag, RecordingSink, Telemetry, TelemetryBuilder,
    TelemetryOptions, TelemetrySink,
};

/// A temporary workspace, cleaned up on drop.
pub struct WorkspaceFixture {
    pub _temp: TempDir,
    /// Workspace root, holds the project files and the checkpoint
    pub root: PathBuf,
    /// Profile directory for sentinel and cache files
    pub profile: PathBuf,
}

impl WorkspaceFixture {
    pub fn project_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE_NAME)
    }

    /// Parse the checkpoint written by the last run.
    pub fn load_state(&self) -> UpgradeState {
        let content = fs::read_to_string(self.state_path()).unwrap_or_else(|e| {
            panic!(
                "failed to read checkpoint at {}: {}",
                self.state_path().display(),
                e
            )
        });
        serde_json::from_str(&content).expect("checkpoint should be valid JSON")
    }

    /// Analytics options rooted at this fixture's profile directory.
    pub fn telemetry_options(&self) -> TelemetryOptions {
        TelemetryOptions::new("Upgrade Assistant", env!("CARGO_PKG_VERSION"))
            .with_profile_dir(&self.profile)
    }

    /// Record consent so analytics clients built from this fixture are enabled.
    pub fn consent(&self) {
        FirstTimeUseNoticeSentinel::new(&self.telemetry_options())
            .create_if_not_exists()
            .expect("sentinel should be writable");
    }
}

/// Builder for [`WorkspaceFixture`].
#[derive(Default)]
pub struct WorkspaceBuilder {
    projects: Vec<String>,
}

impl WorkspaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project file at `relative` (e.g. `src/App/App.csproj`).
    pub fn add_project(mut self, relative: &str) -> Self {
        self.projects.push(relative.to_string());
        self
    }

    pub fn build(self) -> WorkspaceFixture {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = temp.path().join("workspace");
        let profile = temp.path().join("profile");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&profile).unwrap();

        for relative in &self.projects {
            write_project(&root.join(relative));
        }

        WorkspaceFixture {
            _temp: temp,
            root,
            profile,
        }
    }
}

fn write_project(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "<Project Sdk=\"Microsoft.NET.Sdk\" />").unwrap();
}

/// A client writing into a [`RecordingSink`] with empty common properties.
pub fn recording_client(
    options: TelemetryOptions,
    configure: impl FnOnce(TelemetryBuilder) -> TelemetryBuilder,
) -> (Arc<Telemetry>, RecordingSink) {
    let sink = RecordingSink::new();
    let recorder = sink.clone();
    let builder = Telemetry::builder(options)
        .common_properties(PropertyBag::new)
        .sink(move || Ok(Box::new(recorder) as Box<dyn TelemetrySink>));
    (Arc::new(configure(builder).build()), sink)
}
