//! Upgrade pipeline domain: projects, session context, steps and checkpoints

pub mod context;
pub mod error;
pub mod project;
pub mod state;
pub mod step;
pub mod tracking;

pub use context::{PropertyStore, SharedContext, UpgradeContext};
pub use error::UpgradeError;
pub use project::{Project, Workspace, WorkspaceError};
pub use state::{FileStateManager, StateError, StateManager, UpgradeState};
pub use step::{BackupStep, StepOutcome, StepRegistry, UpgradeStep};
pub use tracking::track_project_properties;
