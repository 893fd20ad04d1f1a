//! Exercises the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::process::Command as StdCommand;
use tempfile::{TempDir, tempdir};

fn tester_cmd() -> Command {
    let mut cmd = Command::cargo_bin("cloudify_tester").unwrap();
    cmd.env_remove("CLOUDIFY_PLUGIN_TESTS_CONFIG");
    cmd
}

/// An empty git repository to run the tool in.
fn git_repo() -> TempDir {
    let dir = tempdir().unwrap();
    let status = StdCommand::new("git")
        .args(["init", "-q"])
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert!(status.success());
    dir
}

#[test]
fn test_help_lists_commands() {
    tester_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("template"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_config_outside_a_repository_fails() {
    let dir = tempdir().unwrap();
    tester_cmd()
        .current_dir(dir.path())
        .env("GIT_CEILING_DIRECTORIES", dir.path())
        .args(["config", "schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("git repository"));
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    tester_cmd().arg("bootstrap").assert().failure();
}

#[test]
fn test_missing_required_config_exits_with_2() {
    let repo = git_repo();
    tester_cmd()
        .current_dir(repo.path())
        .args(["config", "validate", "-c", "missing.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Could not find missing.yaml"));
}

#[test]
fn test_valid_config_is_reported_clean() {
    let repo = git_repo();
    fs::write(repo.path().join("test_config.yaml"), "ignore_quality_failures: true\n").unwrap();
    tester_cmd()
        .current_dir(repo.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("test_config.yaml"));
}

#[test]
fn test_invalid_repository_schema_exits_with_1_and_lists_every_error() {
    // --- Setup ---
    let repo = git_repo();
    let schemas = repo.path().join("system_tests").join("schemas");
    fs::create_dir_all(&schemas).unwrap();
    fs::write(
        schemas.join("x.yaml"),
        "first:\n  default: 1\nsecond.entry:\n  description: Dotted\n",
    )
    .unwrap();

    // --- Execute & Assert ---
    tester_cmd()
        .current_dir(repo.path())
        .args(["config", "schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not viable"))
        .stderr(predicate::str::contains("first"))
        .stderr(predicate::str::contains("second.entry"));
}
