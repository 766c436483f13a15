//! Project-level analytics

use crate::core::context::UpgradeContext;
use crate::core::project::Project;
use crate::telemetry::{MeasurementBag, PropertyBag, Telemetry};

fn describe(project: &Project) -> std::io::Result<(PropertyBag, MeasurementBag)> {
    let metadata = std::fs::metadata(project.path())?;
    let properties = PropertyBag::new()
        .with("language", project.language())
        .with("extension", project.extension());
    let measurements = MeasurementBag::new().with("size", metadata.len() as f64);
    Ok((properties, measurements))
}

/// Emit one `project` event per workspace project.
///
/// Projects that cannot be inspected produce a `project/error` event instead.
pub fn track_project_properties(telemetry: &Telemetry, context: &UpgradeContext) {
    if !telemetry.enabled() {
        return;
    }

    for project in context.projects() {
        match describe(project) {
            Ok((properties, measurements)) => {
                telemetry.track_event("project", Some(properties), Some(measurements))
            }
            Err(e) => telemetry.track(
                "project/error",
                PropertyBag::new().with("message", e.to_string()),
            ),
        }
    }
}
