//! Content validators, one per control-file kind.
//!
//! Each validator is a pure function over the staged text and the validation
//! context. Malformed text is reported through the error count, never as a
//! fault. A context missing its session log or device database narrows the
//! checks that run; it never fails the validator.

use crate::core::context::ValidationContext;
use std::collections::HashSet;
use std::fs;

#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Normalized content lines interleaved with ERROR/WARNING annotations.
    pub lines: Vec<String>,
    pub errors: u32,
    pub warnings: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Clean,
    WarningsOnly,
    Erroring,
}

impl ValidationReport {
    pub fn status(&self) -> GateStatus {
        if self.errors > 0 {
            GateStatus::Erroring
        } else if self.warnings > 0 {
            GateStatus::WarningsOnly
        } else {
            GateStatus::Clean
        }
    }
}

struct ReportBuilder {
    lines: Vec<String>,
    errors: u32,
    warnings: u32,
}

impl ReportBuilder {
    fn new() -> Self {
        ReportBuilder {
            lines: Vec::new(),
            errors: 0,
            warnings: 0,
        }
    }

    fn content(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn error(&mut self, msg: String) {
        self.lines.push(format!("  ERROR: {}", msg));
        self.errors += 1;
    }

    fn warning(&mut self, msg: String) {
        self.lines.push(format!("  WARNING: {}", msg));
        self.warnings += 1;
    }

    fn finish(self) -> ValidationReport {
        ValidationReport {
            lines: self.lines,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Trimmed, comment-stripped content lines with their 1-based line numbers.
fn content_lines(text: &str) -> Vec<(usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

fn has_control_chars(line: &str) -> bool {
    line.chars().any(|c| c.is_control() && c != '\t')
}

const KNOWN_DIRECTIVES: &[&str] = &[
    "mission",
    "resume",
    "quit",
    "abort",
    "depth",
    "speed",
    "heading",
    "surface_interval",
    "comms_window",
];

pub fn validate_command(text: &str, _ctx: &ValidationContext) -> ValidationReport {
    let mut report = ReportBuilder::new();
    for (lineno, line) in content_lines(text) {
        report.content(line);
        if has_control_chars(line) {
            report.error(format!("line {}: control characters in directive", lineno));
            continue;
        }
        let directive = line.split_whitespace().next().unwrap_or("");
        if !directive
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            report.error(format!("line {}: malformed directive '{}'", lineno, directive));
        } else if !KNOWN_DIRECTIVES.contains(&directive) {
            report.warning(format!("line {}: unknown directive '{}'", lineno, directive));
        }
    }
    report.finish()
}

pub fn validate_science(text: &str, ctx: &ValidationContext) -> ValidationReport {
    let known_sensors = sensors_from_session_log(ctx);
    let mut report = ReportBuilder::new();
    for (lineno, line) in content_lines(text) {
        report.content(line);
        if has_control_chars(line) {
            report.error(format!("line {}: control characters in entry", lineno));
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            report.error(format!(
                "line {}: expected 'sensor interval depth_min depth_max', got {} field(s)",
                lineno,
                fields.len()
            ));
            continue;
        }
        let sensor = fields[0];
        match fields[1].parse::<f64>() {
            Ok(interval) if interval > 0.0 => {
                if interval < 1.0 {
                    report.warning(format!(
                        "line {}: sampling interval {}s is below 1s",
                        lineno, interval
                    ));
                }
            }
            _ => report.error(format!(
                "line {}: sampling interval '{}' is not a positive number",
                lineno, fields[1]
            )),
        }
        match (fields[2].parse::<f64>(), fields[3].parse::<f64>()) {
            (Ok(min), Ok(max)) => {
                if min > max {
                    report.error(format!(
                        "line {}: depth_min {} exceeds depth_max {}",
                        lineno, min, max
                    ));
                }
            }
            _ => report.error(format!("line {}: depth bounds are not numeric", lineno)),
        }
        if let Some(known) = &known_sensors {
            if !known.contains(sensor) {
                report.warning(format!(
                    "line {}: sensor '{}' not seen in session {} log",
                    lineno, sensor, ctx.session_index
                ));
            }
        }
    }
    report.finish()
}

pub fn validate_targets(text: &str, ctx: &ValidationContext) -> ValidationReport {
    let mut report = ReportBuilder::new();
    for (lineno, line) in content_lines(text) {
        report.content(line);
        if has_control_chars(line) {
            report.error(format!("line {}: control characters in waypoint", lineno));
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields.len() > 4 {
            report.error(format!(
                "line {}: expected 'name lat lon [radius_m]'",
                lineno
            ));
            continue;
        }
        let name = fields[0];
        match fields[1].parse::<f64>() {
            Ok(lat) if (-90.0..=90.0).contains(&lat) => {}
            _ => report.error(format!(
                "line {}: latitude '{}' outside [-90, 90]",
                lineno, fields[1]
            )),
        }
        match fields[2].parse::<f64>() {
            Ok(lon) if (-180.0..=180.0).contains(&lon) => {}
            _ => report.error(format!(
                "line {}: longitude '{}' outside [-180, 180]",
                lineno, fields[2]
            )),
        }
        match fields.get(3) {
            Some(radius) => match radius.parse::<f64>() {
                Ok(r) if r > 0.0 => {}
                _ => report.error(format!(
                    "line {}: arrival radius '{}' is not a positive number",
                    lineno, radius
                )),
            },
            None => report.warning(format!(
                "line {}: no arrival radius; device default applies",
                lineno
            )),
        }
        if !waypoint_known(ctx, name) {
            report.warning(format!(
                "line {}: waypoint '{}' not in device database",
                lineno, name
            ));
        }
    }
    report.finish()
}

/// Sensor names mentioned in the reference session log, when one exists.
/// `None` means the check is skipped entirely (degraded context).
fn sensors_from_session_log(ctx: &ValidationContext) -> Option<HashSet<String>> {
    let log = ctx.session_log.as_ref()?;
    let text = fs::read_to_string(log).ok()?;
    let mut sensors = HashSet::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        for pair in tokens.windows(2) {
            if pair[0] == "sensor" {
                sensors.insert(pair[1].to_string());
            }
        }
    }
    Some(sensors)
}

/// Best-effort lookup against the device database. Any probe failure (no
/// database, no waypoints table, query error) degrades to "known".
fn waypoint_known(ctx: &ValidationContext, name: &str) -> bool {
    let Some(conn) = &ctx.database else {
        return true;
    };
    let Ok(mut stmt) = conn.prepare("SELECT 1 FROM waypoints WHERE name = ?1") else {
        return true;
    };
    stmt.exists([name]).unwrap_or(true)
}
