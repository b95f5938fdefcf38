//! Uplink: operator console for remote-device control files.
//!
//! An unattended device downloads its marching orders from a handful of
//! small "control files" kept on the shore side: a command file, a
//! science-sampling plan, and a target-waypoint list. Uplink is how an
//! operator changes one of them without wrecking a deployment:
//!
//! 1. Resolve the most recent completed session from the comms transcript.
//! 2. Assemble a validation context from the per-session logs and the
//!    device database (both optional; absence degrades, never aborts).
//! 3. Stage a working copy, edit it, and validate it against the context.
//! 4. Decide: at a prompt, or deterministically in `--batch` mode.
//! 5. Commit atomically and append a tamper-evident audit record.
//!
//! No-op edits short-circuit before the commit so the audit trail only
//! records real changes. The live file is only ever mutated by a rename,
//! so a crash mid-commit cannot truncate it.
//!
//! # Crate structure
//!
//! - [`core`]: workflow components (session, context, staging, validation,
//!   commit, audit) and shared primitives
//! - [`workflow`]: the decision state machine tying them together

pub mod core;
pub mod workflow;

use core::audit;
use core::config::{ControlFileKind, RunConfig};
use core::error::UplinkError;
use core::time;
use workflow::RunOutcome;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "uplink",
    version = env!("CARGO_PKG_VERSION"),
    about = "Edit, validate, and commit remote-device control files"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct EditCli {
    /// Working directory holding the live control files (defaults to the
    /// current directory; its name doubles as the device identifier).
    #[clap(short = 'd', long)]
    dir: Option<PathBuf>,
    /// Explicit working file; '-' reads standard input (requires --batch).
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,
    /// Literal content for the working copy.
    #[clap(short = 'c', long, conflicts_with = "file")]
    content: Option<String>,
    /// Unattended mode: no editor, no prompt, one deterministic pass.
    #[clap(short = 'b', long)]
    batch: bool,
    /// Validate even when the staged content is identical to the live file.
    #[clap(long)]
    force: bool,
    /// Accept content despite validation errors (unattended mode).
    #[clap(long)]
    ignore_errors: bool,
    /// Validate and report, but never commit.
    #[clap(long)]
    check: bool,
    /// Device identifier override.
    #[clap(long)]
    device: Option<String>,
    /// Actor identity recorded in the audit trail (defaults to $USER).
    #[clap(long)]
    actor: Option<String>,
    /// Identity the actor is operating for, when invoked by an intermediary.
    #[clap(long)]
    on_behalf_of: Option<String>,
}

#[derive(clap::Args, Debug)]
struct AuditCli {
    /// Which control file's trail to read.
    #[clap(value_enum)]
    kind: KindArg,
    /// Working directory holding the audit logs.
    #[clap(short = 'd', long)]
    dir: Option<PathBuf>,
    /// Output machine-readable JSON.
    #[clap(long)]
    json: bool,
    /// Recompute checksums over the stored snapshots and report mismatches.
    #[clap(long)]
    verify: bool,
    /// Show at most the N most recent records.
    #[clap(long, default_value = "50")]
    limit: usize,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum KindArg {
    Command,
    Science,
    Targets,
}

impl From<KindArg> for ControlFileKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Command => ControlFileKind::Command,
            KindArg::Science => ControlFileKind::Science,
            KindArg::Targets => ControlFileKind::Targets,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Edit the device command file
    Command(EditCli),

    /// Edit the science-sampling plan
    Science(EditCli),

    /// Edit the target-waypoint list
    Targets(EditCli),

    /// Inspect a control file's audit trail
    Audit(AuditCli),
}

pub fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version land on stdout with a clean exit; anything
            // else is a usage error.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return code;
        }
    };

    let result = match cli.command {
        Command::Command(args) => run_edit(ControlFileKind::Command, args),
        Command::Science(args) => run_edit(ControlFileKind::Science, args),
        Command::Targets(args) => run_edit(ControlFileKind::Targets, args),
        Command::Audit(args) => run_audit(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("uplink: {}", e);
            e.exit_code()
        }
    }
}

fn run_edit(kind: ControlFileKind, args: EditCli) -> Result<i32, UplinkError> {
    let config = RunConfig::resolve(
        kind,
        args.dir,
        args.file,
        args.content,
        args.device,
        args.actor,
        args.on_behalf_of,
        args.batch,
        args.force,
        args.ignore_errors,
        args.check,
    )?;

    let outcome = workflow::run_workflow(&config)?;

    if config.batch {
        let envelope = match &outcome {
            RunOutcome::Committed(receipt) => time::outcome_envelope(
                config.kind.label(),
                "committed",
                serde_json::json!({
                    "device": config.device,
                    "byte_size": receipt.byte_size,
                    "crc32": receipt.crc32,
                    "audit_event": receipt.event_id,
                }),
            ),
            RunOutcome::NoChange => time::outcome_envelope(
                config.kind.label(),
                "no_change",
                serde_json::json!({ "device": config.device }),
            ),
            RunOutcome::ValidateOnly(report) => time::outcome_envelope(
                config.kind.label(),
                "validate_only",
                serde_json::json!({
                    "device": config.device,
                    "errors": report.errors,
                    "warnings": report.warnings,
                }),
            ),
        };
        println!("{}", envelope);
    }

    Ok(outcome.exit_code())
}

fn run_audit(args: AuditCli) -> Result<i32, UplinkError> {
    let kind: ControlFileKind = args.kind.into();
    let dir = match args.dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    let log = dir.join(kind.audit_name());

    if !log.exists() {
        println!("No audit trail for {} yet.", kind.live_name());
        return Ok(0);
    }

    if args.verify {
        let failures = audit::verify_records(&log)?;
        if failures.is_empty() {
            println!("Audit trail for {} verified.", kind.live_name());
            return Ok(0);
        }
        eprintln!("Audit trail verification failed:");
        for failure in &failures {
            eprintln!("- {}", failure);
        }
        return Ok(2);
    }

    let records = audit::read_records(&log, args.limit)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&records).unwrap());
    } else {
        print!("{}", audit::render_text(&records));
    }
    Ok(0)
}
