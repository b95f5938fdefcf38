//! Most-recent-session resolution from the device communications transcript.

use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Scan the transcript for session markers and return the highest index seen.
///
/// A marker line starts with a decimal session index followed by two
/// colon-delimited fields and the literal token `GPS`. Markers are not
/// assumed to appear in ascending order; the maximum parsed value wins.
/// An absent or unreadable transcript resolves to `0`; the workflow then
/// runs with a degraded validation context instead of failing.
pub fn resolve_session_index(transcript: &Path) -> u32 {
    let file = match File::open(transcript) {
        Ok(f) => f,
        Err(_) => return 0,
    };
    let marker = Regex::new(r"^(\d+):[^:]*:[^:]* GPS").unwrap();
    let mut max_index = 0u32;
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        if let Some(caps) = marker.captures(&line) {
            if let Ok(idx) = caps[1].parse::<u32>() {
                max_index = max_index.max(idx);
            }
        }
    }
    max_index
}
