//! Validation-context assembly from historical telemetry artifacts.
//!
//! The context degrades instead of failing: a missing session log or device
//! database narrows what the validators can check, nothing more.

use rusqlite::{Connection, OpenFlags};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Last-known device state handed to the validators, owned by one run and
/// passed by reference only.
pub struct ValidationContext {
    pub session_index: u32,
    pub session_log: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub database: Option<Connection>,
}

impl ValidationContext {
    pub fn has_reference_log(&self) -> bool {
        self.session_log.is_some()
    }
}

pub fn build_context(workdir: &Path, device: &str, session_index: u32) -> ValidationContext {
    let session_log = find_session_log(workdir, device, session_index);
    let db_path = workdir.join(format!("{}.db", device));
    let database = open_database(&db_path);
    let database_path = database.as_ref().map(|_| db_path);
    ValidationContext {
        session_index,
        session_log,
        database_path,
        database,
    }
}

/// Highest-indexed readable per-session log at or below `session_index`.
///
/// Linear descending scan down to index 1: logs may be sparse, so a missing
/// index must not mask a present lower one.
fn find_session_log(workdir: &Path, device: &str, session_index: u32) -> Option<PathBuf> {
    for idx in (1..=session_index).rev() {
        let candidate = workdir.join(format!("{}_{:04}.log", device, idx));
        if File::open(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Probe the device database with a read-only open. SQLite opens lazily, so
/// a cheap pragma confirms the file really is a database before the
/// validators rely on it.
fn open_database(path: &Path) -> Option<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).ok()?;
    conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
        .ok()?;
    Some(conn)
}
