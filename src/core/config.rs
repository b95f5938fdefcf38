//! Run configuration resolved once at process start.
//!
//! Everything ambient (working directory, operator identity, editor choice)
//! is captured here and threaded into components by parameter. Components
//! never consult the environment themselves.

use crate::core::context::ValidationContext;
use crate::core::error::UplinkError;
use crate::core::validate::{self, ValidationReport};
use std::path::{Path, PathBuf};

pub type ValidatorFn = fn(&str, &ValidationContext) -> ValidationReport;

/// Which control file this invocation edits. Chosen once from the CLI
/// subcommand and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFileKind {
    Command,
    Science,
    Targets,
}

impl ControlFileKind {
    pub fn label(&self) -> &'static str {
        match self {
            ControlFileKind::Command => "command",
            ControlFileKind::Science => "science",
            ControlFileKind::Targets => "targets",
        }
    }

    /// Name of the live control file inside the working directory.
    pub fn live_name(&self) -> &'static str {
        match self {
            ControlFileKind::Command => "cmdfile",
            ControlFileKind::Science => "sciplan",
            ControlFileKind::Targets => "targets",
        }
    }

    pub fn audit_name(&self) -> String {
        format!("{}.audit.jsonl", self.live_name())
    }

    pub fn validator(&self) -> ValidatorFn {
        match self {
            ControlFileKind::Command => validate::validate_command,
            ControlFileKind::Science => validate::validate_science,
            ControlFileKind::Targets => validate::validate_targets,
        }
    }
}

/// Where the staged working copy comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditSource {
    /// Copy the live file, or fall back to the freshest backup.
    LiveOrBackup,
    /// Read standard input verbatim (unattended only).
    Stdin,
    /// Literal content supplied on the command line.
    Literal(String),
    /// An operator-supplied file, used in place and never deleted.
    Named(PathBuf),
}

#[derive(Debug)]
pub struct RunConfig {
    pub kind: ControlFileKind,
    pub workdir: PathBuf,
    pub device: String,
    pub actor: String,
    pub on_behalf_of: Option<String>,
    pub source: EditSource,
    pub editor: String,
    pub batch: bool,
    pub force: bool,
    pub ignore_errors: bool,
    pub check_only: bool,
}

impl RunConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        kind: ControlFileKind,
        dir: Option<PathBuf>,
        file: Option<PathBuf>,
        content: Option<String>,
        device: Option<String>,
        actor: Option<String>,
        on_behalf_of: Option<String>,
        batch: bool,
        force: bool,
        ignore_errors: bool,
        check_only: bool,
    ) -> Result<RunConfig, UplinkError> {
        let raw_dir = match dir {
            Some(d) => d,
            None => std::env::current_dir()?,
        };
        let workdir = std::fs::canonicalize(&raw_dir)?;

        let source = match (file, content) {
            (Some(p), _) if p.as_os_str() == "-" => EditSource::Stdin,
            (Some(p), _) => EditSource::Named(p),
            (None, Some(text)) => EditSource::Literal(text),
            (None, None) => EditSource::LiveOrBackup,
        };

        if batch && source == EditSource::LiveOrBackup {
            return Err(UplinkError::Usage(
                "unattended mode requires an explicit working-file source (--file or --content)"
                    .to_string(),
            ));
        }
        if source == EditSource::Stdin && !batch {
            return Err(UplinkError::Usage(
                "reading from standard input requires --batch".to_string(),
            ));
        }

        let device = match device {
            Some(d) => d,
            None => infer_device(&workdir)?,
        };

        let actor = actor
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("LOGNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());

        let editor = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .unwrap_or_else(|_| "vi".to_string());

        Ok(RunConfig {
            kind,
            workdir,
            device,
            actor,
            on_behalf_of,
            source,
            editor,
            batch,
            force,
            ignore_errors,
            check_only,
        })
    }

    pub fn live_path(&self) -> PathBuf {
        self.workdir.join(self.kind.live_name())
    }

    pub fn audit_path(&self) -> PathBuf {
        self.workdir.join(self.kind.audit_name())
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.workdir.join("comms.log")
    }

    pub fn database_path(&self) -> PathBuf {
        self.workdir.join(format!("{}.db", self.device))
    }
}

/// The working directory is conventionally named after the device it serves.
fn infer_device(workdir: &Path) -> Result<String, UplinkError> {
    match workdir.file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(UplinkError::MissingDeviceId),
    }
}
