use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn device_dir() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = tmp.path().join("nereid");
    fs::create_dir(&dir).expect("device dir");
    (tmp, dir)
}

fn run_uplink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_uplink"))
        .args(args)
        .output()
        .expect("run uplink")
}

fn run_uplink_with_stdin(args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_uplink"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn uplink");
    child
        .stdin
        .take()
        .expect("stdin handle")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait uplink")
}

fn audit_records(dir: &std::path::Path, name: &str) -> Vec<serde_json::Value> {
    let raw = fs::read_to_string(dir.join(name)).expect("read audit log");
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("parse audit record"))
        .collect()
}

#[test]
fn batch_commit_from_named_file() {
    let (_tmp, dir) = device_dir();
    let draft = dir.join("draft");
    fs::write(&draft, "mission alpha\ndepth 120\n").unwrap();

    let out = run_uplink(&[
        "command",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        draft.to_str().unwrap(),
        "-b",
        "--actor",
        "op1",
    ]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(
        fs::read_to_string(dir.join("cmdfile")).unwrap(),
        "mission alpha\ndepth 120\n"
    );

    let records = audit_records(&dir, "cmdfile.audit.jsonl");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["actor"], "op1");
    assert_eq!(records[0]["kind"], "command");
    assert_eq!(records[0]["validation"]["errors"], 0);

    // Named drafts belong to the operator and survive the run.
    assert!(draft.exists());

    let envelope: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("envelope on stdout");
    assert_eq!(envelope["status"], "committed");
    assert_eq!(envelope["device"], "nereid");
}

#[test]
fn unattended_rejection_leaves_live_file_untouched() {
    let (_tmp, dir) = device_dir();
    fs::write(dir.join("cmdfile"), "mission alpha\n").unwrap();
    let draft = dir.join("draft");
    fs::write(&draft, "BadDirective! 4\n").unwrap();

    let out = run_uplink(&[
        "command",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        draft.to_str().unwrap(),
        "-b",
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(
        fs::read_to_string(dir.join("cmdfile")).unwrap(),
        "mission alpha\n"
    );
    assert!(!dir.join("cmdfile.audit.jsonl").exists());
}

#[test]
fn unattended_acceptance_with_ignore_errors_records_counts_verbatim() {
    let (_tmp, dir) = device_dir();
    let draft = dir.join("draft");
    fs::write(&draft, "BadDirective! 4\n").unwrap();

    let out = run_uplink(&[
        "command",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        draft.to_str().unwrap(),
        "-b",
        "--ignore-errors",
    ]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(
        fs::read_to_string(dir.join("cmdfile")).unwrap(),
        "BadDirective! 4\n"
    );

    let records = audit_records(&dir, "cmdfile.audit.jsonl");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["validation"]["errors"], 1);
}

#[test]
fn noop_edit_short_circuits_without_audit_noise() {
    let (_tmp, dir) = device_dir();
    let live = dir.join("cmdfile");
    fs::write(&live, "mission alpha\n").unwrap();
    let before = fs::metadata(&live).unwrap().modified().unwrap();
    let draft = dir.join("draft");
    fs::write(&draft, "mission alpha\n").unwrap();

    let out = run_uplink(&[
        "command",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        draft.to_str().unwrap(),
        "-b",
    ]);
    assert!(out.status.success());
    assert!(!dir.join("cmdfile.audit.jsonl").exists());
    assert_eq!(fs::metadata(&live).unwrap().modified().unwrap(), before);

    let envelope: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(envelope["status"], "no_change");
}

#[test]
fn force_revalidates_and_commits_identical_content() {
    let (_tmp, dir) = device_dir();
    fs::write(dir.join("cmdfile"), "mission alpha\n").unwrap();
    let draft = dir.join("draft");
    fs::write(&draft, "mission alpha\n").unwrap();

    let out = run_uplink(&[
        "command",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        draft.to_str().unwrap(),
        "-b",
        "--force",
    ]);
    assert!(out.status.success());
    let records = audit_records(&dir, "cmdfile.audit.jsonl");
    assert_eq!(records.len(), 1);
}

#[test]
fn stdin_source_commits_piped_content() {
    let (_tmp, dir) = device_dir();
    let out = run_uplink_with_stdin(
        &["command", "-d", dir.to_str().unwrap(), "-f", "-", "-b"],
        "depth 80\nspeed 1\n",
    );
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(
        fs::read_to_string(dir.join("cmdfile")).unwrap(),
        "depth 80\nspeed 1\n"
    );
}

#[test]
fn literal_content_commits() {
    let (_tmp, dir) = device_dir();
    let out = run_uplink(&[
        "targets",
        "-d",
        dir.to_str().unwrap(),
        "-c",
        "wp1 36.70 -122.05 30\n",
        "-b",
    ]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(
        fs::read_to_string(dir.join("targets")).unwrap(),
        "wp1 36.70 -122.05 30\n"
    );
    assert!(dir.join("targets.audit.jsonl").exists());
}

#[test]
fn validate_only_never_commits() {
    let (_tmp, dir) = device_dir();
    let draft = dir.join("draft");
    fs::write(&draft, "mission alpha\n").unwrap();

    let out = run_uplink(&[
        "command",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        draft.to_str().unwrap(),
        "-b",
        "--check",
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert!(!dir.join("cmdfile").exists());
    assert!(!dir.join("cmdfile.audit.jsonl").exists());

    let envelope: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(envelope["status"], "validate_only");
    assert_eq!(envelope["errors"], 0);
}

#[test]
fn batch_without_source_is_a_usage_error() {
    let (_tmp, dir) = device_dir();
    let out = run_uplink(&["command", "-d", dir.to_str().unwrap(), "-b"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!dir.join("cmdfile").exists());
}

#[test]
fn stdin_without_batch_is_a_usage_error() {
    let (_tmp, dir) = device_dir();
    let out = run_uplink(&["command", "-d", dir.to_str().unwrap(), "-f", "-"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn absent_named_file_is_an_operational_failure() {
    let (_tmp, dir) = device_dir();
    let out = run_uplink(&[
        "command",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        dir.join("nope").to_str().unwrap(),
        "-b",
    ]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn session_context_lands_in_the_audit_record() {
    let (_tmp, dir) = device_dir();
    fs::write(
        dir.join("comms.log"),
        "3:120400:fix GPS lock\n7:151233:fix GPS lock\n2:094501:fix GPS lock\n",
    )
    .unwrap();
    fs::write(dir.join("nereid_0005.log"), "sensor ctd online\n").unwrap();
    let draft = dir.join("draft");
    fs::write(&draft, "ctd 10 0 100\n").unwrap();

    let out = run_uplink(&[
        "science",
        "-d",
        dir.to_str().unwrap(),
        "-f",
        draft.to_str().unwrap(),
        "-b",
    ]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let records = audit_records(&dir, "sciplan.audit.jsonl");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["session_index"], 7);
    let session_log = records[0]["session_log"].as_str().unwrap();
    assert!(session_log.ends_with("nereid_0005.log"));
}
