//! End-to-end tests for the `dosql` binary

use assert_cmd::Command;
use std::io::Write;

#[test]
fn runs_statements_against_a_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cli.db");
    let db = db.to_str().unwrap();

    let output = Command::cargo_bin("dosql")
        .unwrap()
        .args([
            db,
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
            "INSERT INTO users (name) VALUES ('Blah')",
            "SELECT id, name FROM users",
        ])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("1 row(s) affected"));
    assert!(stdout.contains("id\tname"));
    assert!(stdout.contains("1\tBlah"));
}

#[test]
fn debug_level_from_config_logs_statements() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let mut config = std::fs::File::create(&config_path).unwrap();
    writeln!(config, "[logger]\nlevel = \"debug\"").unwrap();

    let output = Command::cargo_bin("dosql")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), ":memory:", "SELECT 1"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains(") SELECT 1"), "stderr was: {stderr}");
}

#[test]
fn reports_query_errors() {
    Command::cargo_bin("dosql")
        .unwrap()
        .args([":memory:", "SELECT * FROM missing"])
        .env_remove("RUST_LOG")
        .assert()
        .failure();
}

#[test]
fn prints_usage_without_arguments() {
    Command::cargo_bin("dosql")
        .unwrap()
        .env_remove("RUST_LOG")
        .assert()
        .failure();
}
