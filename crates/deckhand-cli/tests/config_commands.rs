use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            dir.path().join("config.toml").display().to_string(),
        ));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("model = \"claude-sonnet-4-5\""));
    assert!(contents.contains("[anthropic]"));
}

#[test]
fn test_config_init_fails_if_present() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "model = \"mine\"\n").unwrap();

    cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
