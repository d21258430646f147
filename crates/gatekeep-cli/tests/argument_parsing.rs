//! Focused CLI tests.
//!
//! Argument parsing plus end-to-end runs against the campus demo snapshot.
//! Every run points `--project` at an empty temp dir so no local
//! gatekeep.toml leaks in.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn campus() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/campus.json")
        .display()
        .to_string()
}

fn gatekeep(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gatekeep").unwrap();
    cmd.env_remove("RUST_LOG")
        .args(["--no-color", "--project"])
        .arg(project.path());
    cmd
}

// ============================================================================
// Commands That Need No Snapshot
// ============================================================================

#[test]
fn version_command_succeeds() {
    let project = TempDir::new().unwrap();
    gatekeep(&project)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gatekeep"));
}

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gatekeep"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("physical access control decisions"));
}

#[test]
fn config_shows_defaults() {
    let project = TempDir::new().unwrap();
    gatekeep(&project)
        .args(["config", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_verdict = \"deny\""))
        .stdout(predicate::str::contains("ambiguity_policy = \"require-unique\""));
}

#[test]
fn config_reads_project_file() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("gatekeep.toml"),
        "[engine]\ndefault_verdict = \"allow\"\n",
    )
    .unwrap();

    gatekeep(&project)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("allow"))
        .stdout(predicate::str::contains("gatekeep.toml"));
}

// ============================================================================
// Argument Parsing Errors
// ============================================================================

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn decide_requires_card() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .args(["decide", "--access-point", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn decide_requires_access_point() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .args(["decide", "--card", "a1b2c3d4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn invalid_card_hex_rejected() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .args(["decide", "--card", "xyz1", "--access-point", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn invalid_access_point_rejected() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .args(["decide", "--card", "a1", "--access-point", "front"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn invalid_timestamp_rejected() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .args(["decide", "--card", "a1", "--access-point", "1", "--at", "monday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn at_conflicts_with_unknown_time() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .args([
            "decide",
            "--card",
            "a1",
            "--access-point",
            "1",
            "--at",
            "2024-01-15T09:00:00Z",
            "--unknown-time",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn unrecognized_command_shows_error() {
    Command::cargo_bin("gatekeep")
        .unwrap()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized"));
}

// ============================================================================
// Snapshot Commands
// ============================================================================

#[test]
fn check_accepts_campus_snapshot() {
    let project = TempDir::new().unwrap();
    gatekeep(&project)
        .args(["check", "--snapshot", &campus()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Snapshot version 1"))
        .stdout(predicate::str::contains("No configuration errors"));
}

#[test]
fn check_fails_on_configuration_errors() {
    let project = TempDir::new().unwrap();
    let path = project.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{
            "version": 9,
            "expressions": [
                { "id": 1, "name": "a", "edges": [{ "op": "include", "target": { "expression": 2 } }] },
                { "id": 2, "name": "b", "edges": [{ "op": "include", "target": { "expression": 1 } }] }
            ]
        }"#,
    )
    .unwrap();

    gatekeep(&project)
        .args(["check", "--snapshot"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cyclic identity expression"));
}

#[test]
fn check_fails_on_missing_snapshot() {
    let project = TempDir::new().unwrap();
    gatekeep(&project)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load snapshot"));
}

#[test]
fn decide_grants_staff_in_business_hours() {
    let project = TempDir::new().unwrap();
    gatekeep(&project)
        .args([
            "decide",
            "--snapshot",
            &campus(),
            "--card",
            "a1b2c3d4",
            "--access-point",
            "1",
            "--at",
            "2024-01-15T09:00:00+01:00",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allowed\": true"))
        .stdout(predicate::str::contains("\"rule\": 1"));
}

#[test]
fn decide_denies_unknown_card() {
    let project = TempDir::new().unwrap();
    gatekeep(&project)
        .args([
            "decide",
            "--snapshot",
            &campus(),
            "--card",
            "ffffffff",
            "--access-point",
            "1",
            "--unknown-time",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allowed\": false"))
        .stdout(predicate::str::contains("unknown-card"));
}

#[test]
fn decide_uses_configured_default_verdict() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("gatekeep.toml"),
        format!(
            "[engine]\ndefault_verdict = \"allow\"\n\n[snapshot]\npath = {:?}\n",
            campus()
        ),
    )
    .unwrap();

    gatekeep(&project)
        .args(["decide", "--card", "ffffffff", "--access-point", "1", "--unknown-time"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allowed\": true"));
}
