//! The edit-validate-commit workflow and its decision state machine.
//!
//! States: `Editing -> Validated -> {Accepted, Rejected, ReEdit}`, with
//! `ReEdit` looping back to `Editing`. Unattended runs terminate in one
//! pass; only an operator at a prompt can re-enter the loop.

use crate::core::commit::{self, CommitReceipt};
use crate::core::config::RunConfig;
use crate::core::context;
use crate::core::editor;
use crate::core::error::UplinkError;
use crate::core::session;
use crate::core::staging;
use crate::core::validate::{GateStatus, ValidationReport};
use colored::Colorize;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected,
    ReEdit,
}

#[derive(Debug)]
pub enum RunOutcome {
    Committed(CommitReceipt),
    /// Staged content was byte-identical to the live file; nothing committed,
    /// nothing audited.
    NoChange,
    /// Validate-only run: reported, then stopped short of the Commit Manager.
    ValidateOnly(ValidationReport),
}

impl RunOutcome {
    /// `0` for a commit or an intentional no-op; validate-only deliberately
    /// signals failure so scripts cannot mistake it for a commit.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Committed(_) | RunOutcome::NoChange => 0,
            RunOutcome::ValidateOnly(_) => 2,
        }
    }
}

pub fn run_workflow(config: &RunConfig) -> Result<RunOutcome, UplinkError> {
    ensure_live_writable(config)?;

    let session_index = session::resolve_session_index(&config.transcript_path());
    let ctx = context::build_context(&config.workdir, &config.device, session_index);
    if !ctx.has_reference_log() {
        eprintln!(
            "{} no readable session log for {} at or below session {}; validation context is degraded",
            "warning:".yellow(),
            config.device,
            session_index
        );
    }

    let staged = staging::stage(config)?;
    if let Some(backup) = &staged.seeded_from_backup {
        eprintln!(
            "{} live {} missing; staged from backup {}",
            "note:".cyan(),
            config.kind.live_name(),
            backup.display()
        );
    }

    loop {
        if !config.batch {
            editor::launch_editor(&config.editor, &staged.path).inspect_err(|_| {
                staged.cleanup();
            })?;
        }

        let identical = staging::files_identical(&staged.path, &config.live_path())
            .inspect_err(|_| staged.cleanup())?;
        if identical && !config.force {
            staged.cleanup();
            if !config.batch {
                println!("No changes to {}; nothing to commit.", config.kind.live_name());
            }
            return Ok(RunOutcome::NoChange);
        }
        if identical {
            eprintln!(
                "{} content identical to live {}; validating anyway (--force)",
                "note:".cyan(),
                config.kind.live_name()
            );
        } else if !config.batch {
            editor::show_diff(&config.live_path(), &staged.path);
        }

        let text = fs::read_to_string(&staged.path).inspect_err(|_| staged.cleanup())?;
        let report = (config.kind.validator())(&text, &ctx);
        if !config.batch {
            display_report(config, &report, ctx.session_index);
        }

        if config.check_only {
            staged.cleanup();
            if !config.batch {
                println!("Validate-only run; live {} untouched.", config.kind.live_name());
            }
            return Ok(RunOutcome::ValidateOnly(report));
        }

        match decide(config, &report)? {
            Decision::ReEdit => continue,
            Decision::Rejected => {
                staged.cleanup();
                return Err(UplinkError::Rejected);
            }
            Decision::Accepted => {
                let receipt = commit::commit(config, &ctx, &staged, &report)?;
                if !config.batch {
                    println!(
                        "{} committed {} ({} bytes, crc32 {})",
                        "ok:".green(),
                        config.kind.live_name(),
                        receipt.byte_size,
                        receipt.crc32
                    );
                }
                return Ok(RunOutcome::Committed(receipt));
            }
        }
    }
}

/// Refuse before staging when the live file could not be replaced later.
fn ensure_live_writable(config: &RunConfig) -> Result<(), UplinkError> {
    let live = config.live_path();
    if !live.exists() {
        return Ok(());
    }
    match OpenOptions::new().append(true).open(&live) {
        Ok(_) => Ok(()),
        Err(_) => Err(UplinkError::AccessDenied(live)),
    }
}

fn decide(config: &RunConfig, report: &ValidationReport) -> Result<Decision, UplinkError> {
    if config.batch {
        if report.errors > 0 && !config.ignore_errors {
            return Ok(Decision::Rejected);
        }
        return Ok(Decision::Accepted);
    }
    prompt_decision(report)
}

fn prompt_decision(report: &ValidationReport) -> Result<Decision, UplinkError> {
    let question = if report.errors > 0 {
        format!(
            "Content has {} error(s). Commit anyway, reject, or re-edit? [c/r/e] ",
            report.errors
        )
        .red()
        .to_string()
    } else {
        "Commit, reject, or re-edit? [c/r/e] ".to_string()
    };

    let stdin = io::stdin();
    loop {
        print!("{}", question);
        io::stdout().flush()?;
        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer)? == 0 {
            // EOF at the prompt: treat as a rejection, never an accept.
            return Ok(Decision::Rejected);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "c" | "commit" | "y" | "yes" => return Ok(Decision::Accepted),
            "r" | "reject" | "n" | "no" | "q" => return Ok(Decision::Rejected),
            "e" | "edit" => return Ok(Decision::ReEdit),
            _ => continue,
        }
    }
}

fn display_report(config: &RunConfig, report: &ValidationReport, session_index: u32) {
    println!(
        "--- validation: {} (reference session {}) ---",
        config.kind.label(),
        session_index
    );
    for line in &report.lines {
        let trimmed = line.trim_start();
        if trimmed.starts_with("ERROR:") {
            println!("{}", line.red());
        } else if trimmed.starts_with("WARNING:") {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
    let summary = format!("{} error(s), {} warning(s)", report.errors, report.warnings);
    match report.status() {
        GateStatus::Clean => println!("{}", summary.green()),
        GateStatus::WarningsOnly => println!("{}", summary.yellow()),
        GateStatus::Erroring => println!("{}", summary.red()),
    }
}
