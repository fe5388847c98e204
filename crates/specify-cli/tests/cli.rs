use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `specify` with an isolated config home and no provider credentials in the environment.
fn specify(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("specify").unwrap();
    cmd.env("SPECIFY_HOME", home)
        .env_remove("SPECIFY_OUTPUT")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("OLLAMA_HOST")
        .env_remove("RUST_LOG");
    cmd
}

fn generate_into(home: &Path, out: &Path) {
    specify(home)
        .args(["generate", "--offline", "-p", "A personal blog with 50 readers.", "-o"])
        .arg(out)
        .assert()
        .success()
        .stdout(predicate::str::contains("backend-design.md"));
}

#[test]
fn generate_writes_document_and_profile() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    generate_into(home.path(), out.path());

    let markdown = fs::read_to_string(out.path().join("backend-design.md")).unwrap();
    assert!(markdown.starts_with("# Backend Design Document: "));
    assert!(markdown.contains("## 11. Scalability Roadmap"));
    let record = fs::read_to_string(out.path().join("backend-design.profile.json")).unwrap();
    assert!(record.contains("\"generatorVersion\""));
}

#[test]
fn thin_description_asks_questions_and_exits_2() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    specify(home.path())
        .args(["generate", "--offline", "-p", "I want to build an app", "-o"])
        .arg(out.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("primary action"))
        .stdout(predicate::str::contains("real-time"));
    assert!(!out.path().join("backend-design.md").exists());
}

#[test]
fn no_recommendations_proceeds_on_defaults() {
    let home = TempDir::new().unwrap();
    specify(home.path())
        .args([
            "generate",
            "--offline",
            "--no-recommendations",
            "--stdout",
            "-p",
            "I want to build an app",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("## 1. Executive Summary"))
        .stdout(predicate::str::contains("## 2. Assumptions"));
}

#[test]
fn output_directory_can_come_from_the_environment() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    specify(home.path())
        .env("SPECIFY_OUTPUT", out.path())
        .args(["generate", "--offline", "-p", "An online shop selling shoes to 20,000 customers"])
        .assert()
        .success();
    assert!(out.path().join("backend-design.md").exists());
}

#[test]
fn key_management_round_trip() {
    let home = TempDir::new().unwrap();
    specify(home.path())
        .args(["config", "set-key", "--provider", "OpenAI", "--key", "sk-test-abcdef123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored key for openai"));

    specify(home.path())
        .args(["config", "list-keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openai: sk-...123"))
        .stdout(predicate::str::contains("abcdef").not());

    specify(home.path())
        .args(["config", "delete-key", "--provider", "openai"])
        .assert()
        .success();
    specify(home.path())
        .args(["config", "list-keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No keys stored"));

    specify(home.path())
        .args(["config", "delete-key", "--provider", "openai"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No key found for provider: openai"));
}

#[test]
fn unknown_provider_is_rejected() {
    let home = TempDir::new().unwrap();
    specify(home.path())
        .args(["config", "set-key", "--provider", "gemini", "--key", "abc123456"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Must be one of: anthropic, ollama, openai"));
}

#[test]
fn set_model_shows_up_in_config_show() {
    let home = TempDir::new().unwrap();
    specify(home.path())
        .args(["config", "set-model", "--provider", "anthropic", "--model", "claude-sonnet-4-5"])
        .assert()
        .success();
    specify(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Provider: anthropic"))
        .stdout(predicate::str::contains("Model: claude-sonnet-4-5"))
        .stdout(predicate::str::contains("anthropic key: not set"));
}

#[test]
fn consistency_check_and_fix() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    generate_into(home.path(), out.path());

    specify(home.path())
        .args(["check-consistency", "-d"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("All checks passed"));

    let path = out.path().join("backend-design.md");
    let damaged = fs::read_to_string(&path)
        .unwrap()
        .replace("## 9. Authentication & Authorization", "## 9. Security Notes");
    fs::write(&path, damaged).unwrap();

    specify(home.path())
        .args(["check-consistency", "-d"])
        .arg(out.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("[FAIL]"));

    specify(home.path())
        .args(["fix-inconsistencies", "--dry-run", "-d"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("9. Authentication & Authorization"));
    assert!(fs::read_to_string(&path).unwrap().contains("Security Notes"));

    specify(home.path())
        .args(["fix-inconsistencies", "-d"])
        .arg(out.path())
        .assert()
        .success();
    let repaired = fs::read_to_string(&path).unwrap();
    assert!(repaired.contains("## 9. Authentication & Authorization"));
    assert!(!repaired.contains("Security Notes"));

    specify(home.path())
        .args(["check-consistency", "-d"])
        .arg(out.path())
        .assert()
        .success();
}

#[test]
fn check_consistency_without_a_document_fails() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    specify(home.path())
        .args(["check-consistency", "-d"])
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("backend-design.md"));
}

#[test]
fn check_connection_needs_a_provider() {
    let home = TempDir::new().unwrap();
    specify(home.path())
        .arg("check-connection")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no provider configured"));
}

#[test]
fn explicit_provider_without_a_key_is_an_error() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    specify(home.path())
        .args(["generate", "--provider", "openai", "-p", "An online shop", "-o"])
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("config set-key"));
}
