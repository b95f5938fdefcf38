//! Working-copy staging and byte-level change detection.
//!
//! Exactly one staged document exists per run. Scratch copies live under the
//! system temp directory with a per-run unique name; operator-supplied files
//! are used in place and never deleted by the workflow.

use crate::core::config::{EditSource, RunConfig};
use crate::core::error::UplinkError;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use ulid::Ulid;

#[derive(Debug)]
pub struct StagedDocument {
    pub path: PathBuf,
    /// Which backup seeded the stage, when the live file was absent.
    pub seeded_from_backup: Option<PathBuf>,
    owned: bool,
}

impl StagedDocument {
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Remove the scratch copy and any editor backup artifact. No-op for
    /// operator-supplied files, whose lifecycle belongs to the caller.
    pub fn cleanup(&self) {
        if !self.owned {
            return;
        }
        let _ = fs::remove_file(&self.path);
        let mut backup = self.path.as_os_str().to_owned();
        backup.push("~");
        let _ = fs::remove_file(PathBuf::from(backup));
    }
}

pub fn stage(config: &RunConfig) -> Result<StagedDocument, UplinkError> {
    match &config.source {
        EditSource::Named(path) => {
            if !path.exists() {
                return Err(UplinkError::MissingInput(format!(
                    "working file not found: {}",
                    path.display()
                )));
            }
            Ok(StagedDocument {
                path: path.clone(),
                seeded_from_backup: None,
                owned: false,
            })
        }
        EditSource::Stdin => {
            if !config.batch {
                return Err(UplinkError::MissingInput(
                    "standard input is only a valid source in unattended mode".to_string(),
                ));
            }
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            let path = scratch_path(config.kind.live_name());
            fs::write(&path, &bytes)?;
            Ok(StagedDocument {
                path,
                seeded_from_backup: None,
                owned: true,
            })
        }
        EditSource::Literal(text) => {
            let path = scratch_path(config.kind.live_name());
            fs::write(&path, text)?;
            Ok(StagedDocument {
                path,
                seeded_from_backup: None,
                owned: true,
            })
        }
        EditSource::LiveOrBackup => {
            let path = scratch_path(config.kind.live_name());
            let live = config.live_path();
            if live.exists() {
                fs::copy(&live, &path)?;
                return Ok(StagedDocument {
                    path,
                    seeded_from_backup: None,
                    owned: true,
                });
            }
            match latest_backup(&config.workdir, config.kind.live_name(), &config.kind.audit_name())
            {
                Some(backup) => {
                    fs::copy(&backup, &path)?;
                    Ok(StagedDocument {
                        path,
                        seeded_from_backup: Some(backup),
                        owned: true,
                    })
                }
                None => {
                    // First-time edit: validation still runs over the empty stage.
                    fs::write(&path, "")?;
                    Ok(StagedDocument {
                        path,
                        seeded_from_backup: None,
                        owned: true,
                    })
                }
            }
        }
    }
}

/// Byte-for-byte comparison against the live control file. A missing live
/// file counts as different (first-time commit).
pub fn files_identical(staged: &Path, live: &Path) -> Result<bool, UplinkError> {
    if !live.exists() {
        return Ok(false);
    }
    Ok(fs::read(staged)? == fs::read(live)?)
}

fn scratch_path(live_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("uplink_{}_{}", live_name, Ulid::new()))
}

/// Most-recently-modified file matching `<livefile>.*`, excluding the audit
/// log. Ties break on name so repeated scans stay deterministic.
fn latest_backup(workdir: &Path, live_name: &str, audit_name: &str) -> Option<PathBuf> {
    let prefix = format!("{}.", live_name);
    let mut best: Option<(SystemTime, String, PathBuf)> = None;
    let entries = fs::read_dir(workdir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) || name == audit_name {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let candidate = (modified, name, entry.path());
        match &best {
            Some((t, n, _)) if (*t, n.as_str()) >= (candidate.0, candidate.1.as_str()) => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|(_, _, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ControlFileKind;
    use std::thread::sleep;
    use std::time::Duration;

    fn config_for(dir: &Path, source: EditSource) -> RunConfig {
        RunConfig {
            kind: ControlFileKind::Command,
            workdir: dir.to_path_buf(),
            device: "nereid".to_string(),
            actor: "op".to_string(),
            on_behalf_of: None,
            source,
            editor: "true".to_string(),
            batch: true,
            force: false,
            ignore_errors: false,
            check_only: false,
        }
    }

    #[test]
    fn live_file_seeds_the_stage() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("cmdfile"), "mission alpha\n").unwrap();
        let config = config_for(tmp.path(), EditSource::LiveOrBackup);
        let staged = stage(&config).unwrap();
        assert_eq!(fs::read_to_string(&staged.path).unwrap(), "mission alpha\n");
        assert!(staged.is_owned());
        assert!(staged.seeded_from_backup.is_none());
        staged.cleanup();
        assert!(!staged.path.exists());
    }

    #[test]
    fn freshest_backup_seeds_when_live_is_absent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("cmdfile.1"), "old\n").unwrap();
        sleep(Duration::from_millis(50));
        fs::write(tmp.path().join("cmdfile.2"), "new\n").unwrap();
        let config = config_for(tmp.path(), EditSource::LiveOrBackup);
        let staged = stage(&config).unwrap();
        assert_eq!(fs::read_to_string(&staged.path).unwrap(), "new\n");
        assert_eq!(
            staged.seeded_from_backup.as_deref(),
            Some(tmp.path().join("cmdfile.2").as_path())
        );
        staged.cleanup();
    }

    #[test]
    fn audit_log_is_not_a_backup_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("cmdfile.audit.jsonl"), "{}\n").unwrap();
        let config = config_for(tmp.path(), EditSource::LiveOrBackup);
        let staged = stage(&config).unwrap();
        assert_eq!(fs::read_to_string(&staged.path).unwrap(), "");
        assert!(staged.seeded_from_backup.is_none());
        staged.cleanup();
    }

    #[test]
    fn empty_stage_when_nothing_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path(), EditSource::LiveOrBackup);
        let staged = stage(&config).unwrap();
        assert!(staged.path.exists());
        assert_eq!(fs::read(&staged.path).unwrap().len(), 0);
        staged.cleanup();
    }

    #[test]
    fn named_file_is_used_in_place_and_survives_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let draft = tmp.path().join("draft");
        fs::write(&draft, "quit\n").unwrap();
        let config = config_for(tmp.path(), EditSource::Named(draft.clone()));
        let staged = stage(&config).unwrap();
        assert_eq!(staged.path, draft);
        assert!(!staged.is_owned());
        staged.cleanup();
        assert!(draft.exists());
    }

    #[test]
    fn absent_named_file_is_missing_input() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path(), EditSource::Named(tmp.path().join("nope")));
        let err = stage(&config).unwrap_err();
        assert!(matches!(err, UplinkError::MissingInput(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn change_detector_treats_missing_live_as_different() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("staged");
        fs::write(&staged, "x").unwrap();
        assert!(!files_identical(&staged, &tmp.path().join("cmdfile")).unwrap());
    }

    #[test]
    fn change_detector_matches_identical_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("staged");
        let live = tmp.path().join("cmdfile");
        fs::write(&staged, "mission alpha\n").unwrap();
        fs::write(&live, "mission alpha\n").unwrap();
        assert!(files_identical(&staged, &live).unwrap());
        fs::write(&live, "mission beta\n").unwrap();
        assert!(!files_identical(&staged, &live).unwrap());
    }
}
