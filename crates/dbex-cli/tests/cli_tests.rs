//! CLI integration tests for dbex.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes for configuration errors and offline inspection.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the dbex binary.
fn cmd() -> Command {
    Command::cargo_bin("dbex").unwrap()
}

const BACKUP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<backup xmlns="http://www.atlassian.com/ao" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <database-information>
    <meta key="database.name" value="PostgreSQL"/>
    <meta key="schema-version" value="2"/>
  </database-information>
  <table name="AO_AUTHOR">
    <column name="ID" primaryKey="true" autoIncrement="true" sqlType="4" precision="10"/>
    <column name="NAME" sqlType="12" precision="100"/>
  </table>
  <table name="AO_BOOK">
    <column name="ID" primaryKey="true" autoIncrement="true" sqlType="4" precision="10"/>
    <column name="AUTHOR_ID" sqlType="4" precision="10"/>
    <foreign-key fromTable="AO_BOOK" fromColumn="AUTHOR_ID" toTable="AO_AUTHOR" toColumn="ID"/>
  </table>
  <data tableName="AO_AUTHOR">
    <column name="ID"/>
    <column name="NAME"/>
    <row><integer>1</integer><string>Herbert</string></row>
  </data>
  <data tableName="AO_BOOK">
    <column name="ID"/>
    <column name="AUTHOR_ID"/>
    <row><integer>1</integer><integer>1</integer></row>
    <row><integer>2</integer><integer>1</integer></row>
  </data>
</backup>
"#;

fn backup_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("backup"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_restore_subcommand_help() {
    cmd()
        .args(["restore", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--no-batch"))
        .stdout(predicate::str::contains("--no-clean"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dbex"));
}

#[test]
fn test_global_flags_in_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("--verbosity"));
}

#[test]
fn test_backup_requires_output() {
    cmd()
        .arg("backup")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}

// =============================================================================
// Configuration Error Tests
// =============================================================================

#[test]
fn test_missing_config_file() {
    cmd()
        .args(["--config", "/nonexistent/config.yaml", "health-check"])
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_config() {
    let config = backup_file("database: [unclosed");
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("YAML error"));
}

#[test]
fn test_empty_config_file() {
    let config = backup_file("");
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_config_missing_host() {
    let config = backup_file(
        r#"
database:
  host: ""
  database: app
  user: app
"#,
    );
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("database.host"));
}

#[test]
fn test_unknown_verbosity() {
    cmd()
        .args(["--verbosity", "loud", "inspect", "-i", "/nonexistent.xml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unknown verbosity"));
}

// =============================================================================
// Inspect Tests
// =============================================================================

#[test]
fn test_inspect_prints_tables_and_rows() {
    let file = backup_file(BACKUP);
    cmd()
        .args(["inspect", "-i", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("schema-version = 2"))
        .stdout(predicate::str::contains(
            "AO_BOOK (2 columns, 1 foreign keys): 2 rows",
        ))
        .stdout(predicate::str::contains("Total: 2 tables, 3 rows"));
}

#[test]
fn test_verbosity_filters_logs() {
    let file = backup_file(BACKUP);
    cmd()
        .env_remove("RUST_LOG")
        .args(["--verbosity", "warn", "inspect", "-i", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Inspected").not());
}

#[test]
fn test_rust_log_overrides_verbosity() {
    let file = backup_file(BACKUP);
    cmd()
        .env("RUST_LOG", "info")
        .args(["--verbosity", "warn", "inspect", "-i", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Inspected 2 tables"));
}

#[test]
fn test_inspect_json_output() {
    let file = backup_file(BACKUP);
    let output = cmd()
        .args(["--output-json", "inspect", "-i", file.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["metadata"]["database.name"], "PostgreSQL");
    assert_eq!(value["tables"][0]["name"], "AO_AUTHOR");
    assert_eq!(value["tables"][1]["rows"], 2);
}

#[test]
fn test_inspect_does_not_need_config() {
    let file = backup_file(BACKUP);
    cmd()
        .args([
            "--config",
            "/nonexistent/config.yaml",
            "inspect",
            "-i",
            file.path().to_str().unwrap(),
        ])
        .assert()
        .success();
}

#[test]
fn test_inspect_malformed_document() {
    let file = backup_file("<backup><table name=\"T\"></backup>");
    cmd()
        .args(["inspect", "-i", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_inspect_wrong_root() {
    let file = backup_file("<?xml version=\"1.0\"?><dump/>");
    cmd()
        .args(["inspect", "-i", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("is not named 'backup' as expected"));
}

#[test]
fn test_inspect_missing_file() {
    cmd()
        .args(["inspect", "-i", "/nonexistent/backup.xml"])
        .assert()
        .failure()
        .code(7);
}
