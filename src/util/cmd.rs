//! Subprocess helpers.

use std::process::Command;
use tracing::debug;

/// Log a command just before execution.
///
/// Emits a `tracing::debug!` event with the program name and arguments.
/// Visible with `--verbose` or `RUST_LOG=upgrade_assistant::cmd=debug`.
pub fn log_cmd(cmd: &Command) {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy()).collect();
    debug!(target: "upgrade_assistant::cmd", %program, ?args, "exec");
}

/// Run a command and return its trimmed stdout, or `None` if it could not
/// be spawned or exited unsuccessfully.
pub fn capture_stdout(mut cmd: Command) -> Option<String> {
    log_cmd(&cmd);
    let output = cmd.output().ok()?;
    if !output.status.success() {
        debug!(target: "upgrade_assistant::cmd", status = ?output.status, "command failed");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
