//! Custom assertion helpers for integration tests.

use std::path::Path;

use upgrade_assistant::core::state::UpgradeState;

/// Assert that the checkpoint marks `identity` as upgraded.
pub fn assert_completed(state: &UpgradeState, identity: &str) {
    let key = format!("Completed:{}", identity);
    assert!(
        state.properties.contains_key(&key),
        "Expected '{}' to be marked complete, properties were {:?}",
        identity,
        state.properties
    );
}

/// Assert that a `.bak` copy of the project file exists.
pub fn assert_backed_up(project: &Path) {
    let mut backup = project.as_os_str().to_owned();
    backup.push(".bak");
    assert!(
        Path::new(&backup).is_file(),
        "Expected backup of {} to exist",
        project.display()
    );
}
