//! Atomic replacement of the live control file plus the audit append.
//!
//! The rename is the only step that mutates the live file, so an interrupt
//! at any point leaves either the old content or the new content, never a
//! truncated mix.

use crate::core::audit::{self, AuditRecord};
use crate::core::config::RunConfig;
use crate::core::context::ValidationContext;
use crate::core::error::UplinkError;
use crate::core::staging::StagedDocument;
use crate::core::time;
use crate::core::validate::ValidationReport;
use std::fs;
use std::io;
use std::path::Path;
use ulid::Ulid;

#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub event_id: String,
    pub byte_size: u64,
    pub crc32: String,
    pub sha256: String,
}

/// Write `bytes` to a temp file beside `live`, then rename it into place.
/// The temp file is removed on any failure.
pub fn atomic_replace(live: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = live.parent().unwrap_or_else(|| Path::new("."));
    let name = live
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "control".to_string());
    let tmp = dir.join(format!(".{}.tmp.{}", name, Ulid::new()));
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, live) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Commit the staged document: atomic replace, checksum over the committed
/// bytes, one audit record, then scratch cleanup. Failures clean up the
/// scratch stage before propagating; the live file is never left partial.
pub fn commit(
    config: &RunConfig,
    ctx: &ValidationContext,
    staged: &StagedDocument,
    report: &ValidationReport,
) -> Result<CommitReceipt, UplinkError> {
    let result = commit_inner(config, ctx, staged, report);
    if result.is_err() {
        staged.cleanup();
    }
    result
}

fn commit_inner(
    config: &RunConfig,
    ctx: &ValidationContext,
    staged: &StagedDocument,
    report: &ValidationReport,
) -> Result<CommitReceipt, UplinkError> {
    let live = config.live_path();
    let bytes = fs::read(&staged.path)?;
    atomic_replace(&live, &bytes)?;

    // Checksums come from the committed file, not the stage.
    let committed = fs::read(&live)?;
    let receipt = CommitReceipt {
        event_id: time::new_event_id(),
        byte_size: committed.len() as u64,
        crc32: audit::crc32_hex(&committed),
        sha256: audit::sha256_hex(&committed),
    };

    let record = AuditRecord {
        ts: time::now_epoch_z(),
        event_id: receipt.event_id.clone(),
        actor: config.actor.clone(),
        on_behalf_of: config.on_behalf_of.clone(),
        kind: config.kind.label().to_string(),
        byte_size: receipt.byte_size,
        crc32: receipt.crc32.clone(),
        sha256: receipt.sha256.clone(),
        content: String::from_utf8_lossy(&committed).into_owned(),
        session_log: ctx
            .session_log
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        session_index: ctx.session_index,
        validation: report.into(),
    };
    audit::append_record(&config.audit_path(), &record)?;

    staged.cleanup();
    Ok(receipt)
}
