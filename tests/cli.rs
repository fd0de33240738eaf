// ABOUTME: Integration tests for the dockyard CLI commands.
// ABOUTME: Validates --help output, init, templates, and exit codes for failed runs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn dockyard_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dockyard"));
    cmd.env_remove("RUST_LOG")
        .env_remove("DOCKYARD_DOCKER")
        .env_remove("DOCKYARD_KUBECTL")
        .env_remove("DOCKYARD_NAMESPACE");
    cmd
}

#[test]
fn help_shows_commands() {
    dockyard_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("containerize"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("diff"))
        .stdout(predicate::str::contains("templates"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dockyard.yml");

    dockyard_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--image", "acme/web:v1"])
        .assert()
        .success();

    assert!(config_path.exists(), "dockyard.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("image_name: acme/web:v1"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dockyard.yml");

    fs::write(&config_path, "default_namespace: mine").unwrap();

    dockyard_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn templates_lists_catalogue() {
    dockyard_cmd()
        .arg("templates")
        .assert()
        .success()
        .stdout(predicate::str::contains("dockerfile-python"))
        .stdout(predicate::str::contains("dockerfile-generic"));
}

#[test]
fn templates_as_json() {
    let output = dockyard_cmd()
        .args(["--output", "json", "templates"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listing: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 10);
    assert_eq!(listing[0]["name"], "dockerfile-python");
}

#[test]
fn unknown_template_exits_nonzero_with_json_result() {
    let temp_dir = tempfile::tempdir().unwrap();

    let output = dockyard_cmd()
        .current_dir(temp_dir.path())
        .args(["--output", "json", "containerize", ".", "--template", "cobol"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["failed_stage"], "template");
    assert_eq!(result["error"]["category"], "generation_error");
}

#[test]
fn invalid_manifest_fails_deploy_without_kubectl() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("app.yaml"), "kind: Deployment\n").unwrap();

    dockyard_cmd()
        .current_dir(temp_dir.path())
        .env("DOCKYARD_KUBECTL", "/nonexistent/kubectl")
        .args(["deploy", "app.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest missing required field: apiVersion"));
}

#[test]
fn malformed_config_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("dockyard.yml"), "tools: [docker\n").unwrap();

    dockyard_cmd()
        .current_dir(temp_dir.path())
        .args(["diff", "app.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YAML parse error"));
}
