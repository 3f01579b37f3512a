// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

#![cfg(feature = "tool")]

//! Integration tests for the `stcs` CLI tool binary.
//!
//! These tests run the actual binary and verify its behavior.

use std::io::Write;
use std::process::{Command, Stdio};

/// Get the path to the stcs binary
fn stcs_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps
    path.push("stcs");
    path
}

/// Run the stcs binary with CLI arguments
fn run_cli(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(stcs_binary())
        .args(args)
        .output()
        .expect("Failed to execute stcs binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `stcs plan` with a table list piped into stdin
fn run_plan(input: &str, args: &[&str]) -> (String, String, bool) {
    let mut child = Command::new(stcs_binary())
        .arg("plan")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn stcs binary");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ============================================================================
// plan
// ============================================================================

#[test]
fn test_plan_chooses_full_bucket() {
    let (stdout, stderr, success) = run_plan("1MiB\n1MiB\n1MiB\n1MiB\n", &[]);
    assert!(success, "plan failed: {}", stderr);

    assert!(stdout.contains("tables: 4"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("#0: 4 tables"), "Unexpected output: {}", stdout);
    assert!(
        stdout.contains("chosen: [0, 1, 2, 3]"),
        "Unexpected output: {}",
        stdout
    );
    assert!(stdout.contains("pending: 1"), "Unexpected output: {}", stdout);
}

#[test]
fn test_plan_below_min_threshold() {
    let (stdout, stderr, success) = run_plan("1MiB\n1MiB\n1MiB\n", &[]);
    assert!(success, "plan failed: {}", stderr);

    assert!(stdout.contains("chosen: nothing"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("pending: 0"), "Unexpected output: {}", stdout);
}

#[test]
fn test_plan_comments_and_rates() {
    let input = "\
# size  reads/s
1MiB    0.0
1MiB    0.0

200MiB  5.0   # hot
200MiB  5.0
";

    let (stdout, stderr, success) = run_plan(input, &["--min-threshold", "2"]);
    assert!(success, "plan failed: {}", stderr);

    assert!(stdout.contains("tables: 4"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("chosen: [2, 3]"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("pending: 2"), "Unexpected output: {}", stdout);
}

#[test]
fn test_plan_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tables.txt");
    std::fs::write(&path, "4KiB\n4KiB\n").unwrap();

    let (stdout, stderr, success) = run_cli(&[
        "plan",
        path.to_str().unwrap(),
        "--min-threshold",
        "2",
        "--max-threshold",
        "2",
    ]);
    assert!(success, "plan failed: {}", stderr);
    assert!(stdout.contains("chosen: [0, 1]"), "Unexpected output: {}", stdout);
}

#[test]
fn test_plan_invalid_input() {
    let (_, stderr, success) = run_plan("lots\n", &[]);
    assert!(!success);
    assert!(stderr.contains("line 1"), "Unexpected error: {}", stderr);
}

#[test]
fn test_plan_invalid_thresholds() {
    let (_, stderr, success) = run_plan("", &["--min-threshold", "8", "--max-threshold", "4"]);
    assert!(!success);
    assert!(stderr.contains("Invalid options"), "Unexpected error: {}", stderr);
}

// ============================================================================
// simulate
// ============================================================================

#[test]
fn test_simulate_settles() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, stderr, success) = run_cli(&[
        "simulate",
        "-n",
        "16",
        "--flush-size",
        "1KiB",
        "--min-threshold",
        "4",
        "--max-threshold",
        "4",
        "--log-dir",
        dir.path().to_str().unwrap(),
    ]);
    assert!(success, "simulate failed: {}", stderr);

    assert!(
        stdout.contains("ran 5 compactions"),
        "Unexpected output: {}",
        stdout
    );
    assert!(stdout.contains("tables: 1"), "Unexpected output: {}", stdout);

    let log = std::fs::read_to_string(dir.path().join("compaction.log")).unwrap();
    assert_eq!(
        5,
        log.lines()
            .filter(|line| line.contains(r#""type":"compaction""#))
            .count()
    );
}
