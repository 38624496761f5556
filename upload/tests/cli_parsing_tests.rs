//! CLI tests for rup
//!
//! Argument parsing is checked with `--help` so nothing is executed. End-to-end runs substitute
//! a small shell script for rsync via `--rsync-bin`.

use std::os::unix::fs::PermissionsExt;

use assert_cmd::Command;

fn rup() -> Command {
    Command::cargo_bin("rup").unwrap()
}

/// Writes an executable shell script named `name` into `dir`.
fn fake_program(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_help_runs() {
    rup().arg("--help").assert().success();
}

#[test]
fn test_version_runs() {
    rup().arg("--version").assert().success();
}

#[test]
fn test_missing_arguments_fail() {
    rup().assert().failure();
    rup().arg("/tmp").assert().failure();
}

// ============================================================================
// Option parsing
// ============================================================================

#[test]
fn test_upload_flags() {
    rup()
        .args(["-o", "--resume", "-j", "8", "--help"])
        .assert()
        .success();
    rup()
        .args(["--overwrite", "--threads", "2", "--help"])
        .assert()
        .success();
}

#[test]
fn test_threads_must_be_a_number() {
    rup()
        .args(["--threads", "many", "--help"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'many'"));
}

#[test]
fn test_strategy_values() {
    for strategy in ["rsync", "ssh", "SSH"] {
        rup()
            .args(["--strategy", strategy, "--help"])
            .assert()
            .success();
    }
    rup()
        .args(["--strategy", "scp", "--help"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'scp'"));
}

#[test]
fn test_program_overrides() {
    rup()
        .args([
            "--rsync-bin",
            "/opt/rsync",
            "--ssh-bin",
            "/opt/ssh",
            "--scp-bin",
            "/opt/scp",
            "--help",
        ])
        .assert()
        .success();
}

#[test]
fn test_progress_type_values() {
    for progress_type in [
        "auto",
        "Auto",
        "progress-bar",
        "ProgressBar",
        "text-updates",
        "TextUpdates",
    ] {
        rup()
            .args(["--progress-type", progress_type, "--help"])
            .assert()
            .success();
    }
    rup()
        .args(["--progress-type", "invalid-value", "--help"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'invalid-value'"));
}

#[test]
fn test_output_flags() {
    rup()
        .args(["--progress", "--progress-delay", "1s", "--summary", "-vv", "-q", "--help"])
        .assert()
        .success();
}

#[test]
fn test_throttle_and_runtime_flags() {
    rup()
        .args([
            "--ops-throttle",
            "100",
            "--max-workers",
            "2",
            "--max-blocking-threads",
            "4",
            "--help",
        ])
        .assert()
        .success();
}

// ============================================================================
// End-to-end runs
// ============================================================================

#[test]
fn test_invalid_target_exits_with_error() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("file.txt");
    std::fs::write(&src, "data").unwrap();
    rup()
        .arg(&src)
        .arg("backup-host:/srv/file.txt")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("invalid target"));
}

#[test]
fn test_upload_runs_rsync() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("file.txt");
    std::fs::write(&src, "data").unwrap();
    let log = tmp.path().join("rsync-args.log");
    let rsync = fake_program(
        tmp.path(),
        "fake-rsync",
        &format!("printf '%s\\n' \"$@\" > '{}'", log.display()),
    );
    rup()
        .arg("--rsync-bin")
        .arg(&rsync)
        .arg("--summary")
        .arg(&src)
        .arg("ssh://backup-host:/srv/in/file.txt")
        .assert()
        .success()
        .stdout(predicates::str::contains("files transferred: 1"));
    let args = std::fs::read_to_string(&log).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(
        args,
        [
            "-av",
            "--partial",
            "--rsync-path=mkdir -p /srv/in && rsync",
            src.to_str().unwrap(),
            "backup-host:/srv/in/file.txt",
        ]
    );
}

#[test]
fn test_rsync_failure_exits_with_error() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("file.txt");
    std::fs::write(&src, "data").unwrap();
    let rsync = fake_program(
        tmp.path(),
        "fake-rsync",
        "echo 'rsync: connection unexpectedly closed' >&2\nexit 23",
    );
    rup()
        .arg("--rsync-bin")
        .arg(&rsync)
        .arg(&src)
        .arg("ssh://backup-host:/srv/file.txt")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("exit code 23"))
        .stderr(predicates::str::contains("connection unexpectedly closed"));
}

#[test]
fn test_quiet_failure_prints_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    rup()
        .arg("-q")
        .arg(tmp.path().join("missing"))
        .arg("ssh://backup-host:/srv/file.txt")
        .assert()
        .code(1)
        .stderr(predicates::str::is_empty());
}

#[test]
fn test_directory_upload_with_summary() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("tree");
    std::fs::create_dir_all(src.join("sub")).unwrap();
    std::fs::write(src.join("a.txt"), "a").unwrap();
    std::fs::write(src.join("sub/b.txt"), "b").unwrap();
    let log = tmp.path().join("destinations.log");
    let rsync = fake_program(
        tmp.path(),
        "fake-rsync",
        &format!("for last; do :; done\necho \"$last\" >> '{}'", log.display()),
    );
    rup()
        .arg("--rsync-bin")
        .arg(&rsync)
        .args(["-j", "2", "--summary"])
        .arg(&src)
        .arg("ssh://backup-host:/srv/tree")
        .assert()
        .success()
        .stdout(predicates::str::contains("files transferred: 2"));
    let mut destinations: Vec<String> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    destinations.sort();
    assert_eq!(
        destinations,
        [
            "backup-host:/srv/tree/a.txt",
            "backup-host:/srv/tree/sub/b.txt"
        ]
    );
}
