//! Append-only audit trail for committed control files.
//!
//! One JSONL record per accepted commit, carrying the full committed content
//! and its checksums so the trail is tamper-evident on its own.

use crate::core::error::UplinkError;
use crate::core::validate::ValidationReport;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditRecord {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_behalf_of: Option<String>,
    pub kind: String,
    pub byte_size: u64,
    pub crc32: String,
    pub sha256: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_log: Option<String>,
    pub session_index: u32,
    pub validation: ValidationSummary,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationSummary {
    pub lines: Vec<String>,
    pub errors: u32,
    pub warnings: u32,
}

impl From<&ValidationReport> for ValidationSummary {
    fn from(report: &ValidationReport) -> Self {
        ValidationSummary {
            lines: report.lines.clone(),
            errors: report.errors,
            warnings: report.warnings,
        }
    }
}

pub fn crc32_hex(bytes: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn append_record(log_path: &Path, record: &AuditRecord) -> Result<(), UplinkError> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(f, "{}", serde_json::to_string(record).unwrap())?;
    Ok(())
}

/// Read up to `limit` most recent records. Unparseable lines are skipped
/// rather than fatal; `verify_records` is the place that flags them.
pub fn read_records(log_path: &Path, limit: usize) -> Result<Vec<AuditRecord>, UplinkError> {
    let file = File::open(log_path)?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<AuditRecord>(&line) {
            records.push(record);
        }
    }
    if records.len() > limit {
        records.drain(..records.len() - limit);
    }
    Ok(records)
}

/// Recompute both checksums over each record's stored content snapshot.
/// Returns one message per integrity failure; empty means the trail is
/// self-consistent.
pub fn verify_records(log_path: &Path) -> Result<Vec<String>, UplinkError> {
    let file = File::open(log_path)?;
    let mut failures = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AuditRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                failures.push(format!("line {}: unparseable record: {}", lineno + 1, e));
                continue;
            }
        };
        let bytes = record.content.as_bytes();
        if crc32_hex(bytes) != record.crc32 {
            failures.push(format!(
                "record {}: CRC-32 mismatch (stored {})",
                record.event_id, record.crc32
            ));
        }
        if sha256_hex(bytes) != record.sha256 {
            failures.push(format!(
                "record {}: SHA-256 mismatch (stored {})",
                record.event_id, record.sha256
            ));
        }
        if bytes.len() as u64 != record.byte_size {
            failures.push(format!(
                "record {}: byte size mismatch (stored {}, snapshot {})",
                record.event_id,
                record.byte_size,
                bytes.len()
            ));
        }
    }
    Ok(failures)
}

/// Compact one-line-per-commit rendering for the terminal.
pub fn render_text(records: &[AuditRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:<10} {:<14} {:>5} {:>9} {:>4}  {}\n",
        "TIME", "KIND", "ACTOR", "SESS", "CRC32", "E/W", "EVENT"
    ));
    for r in records {
        out.push_str(&format!(
            "{:<12} {:<10} {:<14} {:>5} {:>9} {:>2}/{}  {}\n",
            r.ts,
            r.kind,
            r.actor,
            r.session_index,
            r.crc32,
            r.validation.errors,
            r.validation.warnings,
            r.event_id
        ));
    }
    out
}
