// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the resdeps CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// resdeps pointed at an isolated data directory
fn resdeps(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("resdeps").unwrap();
    cmd.env("RESDEPS_DATA_DIR", data_dir.path())
        .env("RESDEPS_CONFIG", data_dir.path().join("config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn run_ok(data_dir: &TempDir, args: &[&str]) {
    resdeps(data_dir).args(args).assert().success();
}

/// Two resources: alpha 1.0.0 requires beta >= 2.0.0
fn seed(data_dir: &TempDir) {
    std::fs::write(data_dir.path().join("config.toml"), "log_level = \"warn\"\n").unwrap();
    run_ok(data_dir, &["resource", "add", "alpha"]);
    run_ok(data_dir, &["resource", "add", "beta", "--kind", "plugin"]);
    run_ok(data_dir, &["version", "add", "alpha", "1.0.0"]);
    run_ok(data_dir, &["version", "add", "beta", "2.0.0"]);
    run_ok(data_dir, &["dep", "add", "ver:alpha@1.0.0", "--on", "beta", "--min", "2.0.0"]);
    run_ok(data_dir, &["version", "publish", "ver:alpha@1.0.0"]);
    run_ok(data_dir, &["version", "publish", "ver:beta@2.0.0"]);
}

#[test]
fn test_resource_lifecycle() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);

    resdeps(&data_dir)
        .args(["resource", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("res:alpha"))
        .stdout(predicate::str::contains("res:beta"));

    resdeps(&data_dir)
        .args(["resource", "show", "beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0.0"))
        .stdout(predicate::str::contains("PUBLISHED"));

    assert!(data_dir.path().join("deps.json").exists());
}

#[test]
fn test_resolve_prints_plan() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);

    resdeps(&data_dir)
        .args(["resolve", "ver:alpha@1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. beta 2.0.0 (>= 2.0.0)"))
        .stdout(predicate::str::contains("2. alpha 1.0.0"));
}

#[test]
fn test_resolve_json() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);

    let output = resdeps(&data_dir)
        .args(["--json", "resolve", "ver:alpha@1.0.0"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["state"], "RESOLVED");
    assert_eq!(report["plan"]["steps"][0]["version_id"], "ver:beta@2.0.0");
    assert_eq!(report["plan"]["steps"][1]["version_id"], "ver:alpha@1.0.0");
}

#[test]
fn test_cycle_is_rejected() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);
    run_ok(&data_dir, &["version", "add", "beta", "2.1.0"]);

    resdeps(&data_dir)
        .args(["dep", "add", "ver:beta@2.1.0", "--on", "alpha"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular dependency"));

    resdeps(&data_dir)
        .args(["dep", "list", "ver:beta@2.1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("has no dependencies"));
}

#[test]
fn test_published_version_is_locked() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);

    resdeps(&data_dir)
        .args(["dep", "add", "ver:beta@2.0.0", "--external", "Loader", "--url", "https://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DRAFT or REJECTED"));
}

#[test]
fn test_graph_dot_export() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);

    resdeps(&data_dir)
        .args(["graph", "ver:alpha@1.0.0", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph dependencies"))
        .stdout(predicate::str::contains("\"ver:alpha@1.0.0\" -> \"ver:beta@2.0.0\""));
}

#[test]
fn test_dependents() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);

    resdeps(&data_dir)
        .args(["dependents", "beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha [REQUIRED >= 2.0.0]"));

    resdeps(&data_dir)
        .args(["dependents", "alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing depends on alpha"));
}

#[test]
fn test_invalid_dependency_type() {
    let data_dir = TempDir::new().unwrap();
    seed(&data_dir);
    run_ok(&data_dir, &["version", "add", "alpha", "1.1.0"]);

    resdeps(&data_dir)
        .args(["dep", "add", "ver:alpha@1.1.0", "--on", "beta", "--type", "recommended"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown dependency type"));
}

#[test]
fn test_config_show_reflects_file() {
    let data_dir = TempDir::new().unwrap();
    std::fs::write(data_dir.path().join("config.toml"), "max_depth = 7\n").unwrap();

    resdeps(&data_dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_depth = 7"));
}

#[test]
fn test_completions() {
    let data_dir = TempDir::new().unwrap();
    std::fs::write(data_dir.path().join("config.toml"), "").unwrap();

    resdeps(&data_dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("resdeps"));
}
