//! Projects and workspace discovery

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File extensions recognized as project files.
pub const PROJECT_EXTENSIONS: &[&str] = &["csproj", "vbproj", "fsproj"];

const SKIPPED_DIRS: &[&str] = &["bin", "obj"];

/// Errors raised while discovering a workspace
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Not a project file: {0}")]
    NotAProject(PathBuf),

    #[error("Failed to scan workspace: {0}")]
    IoError(#[from] std::io::Error),
}

/// A project file in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Project {
    path: PathBuf,
}

impl Project {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Full path of the project file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity used across runs: the file name only.
    pub fn identity(&self) -> String {
        normalize_identity(&self.path)
    }

    /// File extension, lowercased.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Source language implied by the extension.
    pub fn language(&self) -> &'static str {
        match self.extension().as_str() {
            "csproj" => "csharp",
            "vbproj" => "visualbasic",
            "fsproj" => "fsharp",
            _ => "unknown",
        }
    }
}

/// Normalize a path to its persisted identity (file name only).
pub fn normalize_identity(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_project_file(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            PROJECT_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// A discovered workspace: its root directory and project files.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub projects: Vec<Project>,
    /// The project named on the command line, if a file was given
    pub requested: Option<Project>,
}

impl Workspace {
    /// Discover the workspace for a project file or a directory.
    ///
    /// For a file, the workspace root is its parent directory.
    pub fn discover(target: &Path) -> Result<Self, WorkspaceError> {
        if !target.exists() {
            return Err(WorkspaceError::NotFound(target.to_path_buf()));
        }

        let (root, requested) = if target.is_file() {
            if !is_project_file(target) {
                return Err(WorkspaceError::NotAProject(target.to_path_buf()));
            }
            let root = workspace_root(target);
            let requested = match target.file_name() {
                Some(name) => root.join(name),
                None => target.to_path_buf(),
            };
            (root, Some(Project::new(requested)))
        } else {
            (target.to_path_buf(), None)
        };

        let projects = discover_projects(&root)?;
        debug!(root = %root.display(), count = projects.len(), "discovered projects");

        Ok(Self {
            root,
            projects,
            requested,
        })
    }
}

/// Directory holding a project file; a bare file name means the current directory.
fn workspace_root(file: &Path) -> PathBuf {
    file.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Recursively find project files under `root`, sorted by path.
///
/// Hidden directories and `bin`/`obj` build output are skipped.
pub fn discover_projects(root: &Path) -> std::io::Result<Vec<Project>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type()?.is_dir() {
                if !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_str()) {
                    pending.push(path);
                }
            } else if is_project_file(&path) {
                found.push(Project::new(path));
            }
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}
