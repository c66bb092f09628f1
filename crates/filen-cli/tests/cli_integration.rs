//! CLI smoke tests: argument surface and offline behavior.
//!
//! Anything touching the network needs an account, so these tests only
//! exercise parsing, help output, and the not-logged-in paths against an
//! isolated HOME.

use assert_cmd::Command;
use predicates::prelude::*;

fn filen_with_home(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("filen").unwrap();
    cmd.env("HOME", home);
    cmd
}

#[test]
fn help_lists_core_commands() {
    let mut cmd = Command::cargo_bin("filen").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("download-path"))
        .stdout(predicate::str::contains("webdav-start"))
        .stdout(predicate::str::contains("list-trash"));
}

#[test]
fn version_flag_works() {
    let mut cmd = Command::cargo_bin("filen").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("filen"));
}

#[test]
fn unknown_command_fails_with_usage() {
    let mut cmd = Command::cargo_bin("filen").unwrap();
    cmd.arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage").or(predicate::str::contains("error")));
}

#[test]
fn whoami_without_credentials_fails() {
    let home = tempfile::tempdir().unwrap();
    filen_with_home(home.path())
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not logged in"));
}

#[test]
fn ls_without_credentials_points_to_login() {
    let home = tempfile::tempdir().unwrap();
    filen_with_home(home.path())
        .arg("ls")
        .assert()
        .failure()
        .stderr(predicate::str::contains("filen login"));
}

#[test]
fn upload_requires_sources() {
    let mut cmd = Command::cargo_bin("filen").unwrap();
    cmd.arg("upload").assert().failure();
}

#[test]
fn on_conflict_rejects_unknown_values() {
    let home = tempfile::tempdir().unwrap();
    filen_with_home(home.path())
        .args(["upload", "whatever.txt", "--on-conflict", "merge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("merge"));
}

#[test]
fn webdav_status_without_pid_file_fails() {
    let home = tempfile::tempdir().unwrap();
    filen_with_home(home.path())
        .arg("webdav-status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not running"));
}

#[test]
fn webdav_config_prints_defaults() {
    let home = tempfile::tempdir().unwrap();
    filen_with_home(home.path())
        .arg("webdav-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("8080"))
        .stdout(predicate::str::contains("filen-webdav"));
}
