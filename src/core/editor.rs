//! Blocking spawns of the operator's editor and the difference reporter.
//!
//! Both calls suspend the whole process on operator input. That is the
//! intended pacing for an operator-facing tool, not a service.

use crate::core::error::UplinkError;
use std::path::Path;
use std::process::Command;

/// Launch the configured editor on the staged document and wait for it.
pub fn launch_editor(editor: &str, path: &Path) -> Result<(), UplinkError> {
    let status = Command::new(editor)
        .arg(path)
        .status()
        .map_err(|e| UplinkError::External(format!("failed to launch editor '{}': {}", editor, e)))?;
    if !status.success() {
        return Err(UplinkError::External(format!(
            "editor '{}' exited with failure",
            editor
        )));
    }
    Ok(())
}

/// Best-effort unified diff between the live file and the staged copy.
/// Absence of a `diff` binary is not an error; the byte-level change
/// detector remains authoritative.
pub fn show_diff(live: &Path, staged: &Path) {
    if !live.exists() {
        return;
    }
    let _ = Command::new("diff").arg("-u").arg(live).arg(staged).status();
}
