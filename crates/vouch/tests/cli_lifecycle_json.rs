use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "entities": [
    {
      "entityName": "EMPLOYEE",
      "fields": [
        { "name": "EMP_ID", "primaryKey": true, "dataType": "INTEGER" },
        { "name": "NAME", "required": true, "maxLength": 40 },
        { "name": "DEPT" }
      ]
    }
  ]
}"#;

fn vouch_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vouch"))
}

fn run_cli(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(vouch_bin());
    cmd.args(args);
    cmd.env_remove("VOUCH_CONFIG").env_remove("VOUCH_ACTOR");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to execute vouch CLI")
}

fn parse_json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout
        .find(|c| c == '{' || c == '[')
        .unwrap_or_else(|| {
            panic!(
                "no JSON payload found in output\nstdout:\n{}\nstderr:\n{}",
                stdout,
                String::from_utf8_lossy(&output.stderr)
            )
        });
    let mut deserializer = serde_json::Deserializer::from_str(&stdout[json_start..]);
    serde_json::Value::deserialize(&mut deserializer).unwrap_or_else(|err| {
        panic!(
            "failed to parse JSON output: {}\nstdout:\n{}\nstderr:\n{}",
            err,
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn run_cli_json<T: DeserializeOwned>(args: &[&str], envs: &[(&str, &str)]) -> T {
    let output = run_cli(args, envs);
    assert!(
        output.status.success(),
        "command failed: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_value(parse_json_output(&output)).unwrap_or_else(|err| {
        panic!(
            "failed to deserialize JSON output: {}\nstdout:\n{}",
            err,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

/// A lifecycle outcome that is not a success: exit status 2, status JSON.
fn run_cli_rejected(args: &[&str], envs: &[(&str, &str)]) -> Status {
    let output = run_cli(args, envs);
    assert_eq!(
        output.status.code(),
        Some(2),
        "unexpected exit for {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_value(parse_json_output(&output)).expect("status JSON")
}

fn run_cli_json_error(args: &[&str], envs: &[(&str, &str)]) -> serde_json::Value {
    let output = run_cli(args, envs);
    assert_eq!(
        output.status.code(),
        Some(1),
        "command did not fail: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    parse_json_output(&output)
}

#[derive(Debug, Deserialize)]
struct Status {
    code: String,
    message: String,
    #[serde(default)]
    errors: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct InitResult {
    entities: Vec<String>,
}

struct Workspace {
    home: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let home = TempDir::new().expect("create temp home");
        fs::write(home.path().join("catalog.json"), CATALOG).unwrap();
        let workspace = Self { home };
        let init: InitResult = run_cli_json(&["init"], &workspace.envs());
        assert_eq!(init.entities, vec!["EMPLOYEE"]);
        workspace
    }

    fn envs(&self) -> Vec<(&str, &str)> {
        vec![
            ("VOUCH_HOME", self.home.path().to_str().expect("utf-8 temp path")),
            ("RUST_LOG", "error"),
        ]
    }
}

#[test]
fn test_add_approve_then_read() {
    let ws = Workspace::new();
    let envs = ws.envs();
    let ada = r#"{"EMP_ID": 7, "NAME": "Ada", "DEPT": "R&D"}"#;

    let status: Status = run_cli_json(
        &["submit", "EMPLOYEE", "--request", "add", "--data", ada, "--actor", "maker"],
        &envs,
    );
    assert_eq!(status.code, "SUCCESS");
    assert_eq!(status.message, "Data added for approval: ADD");

    let pending = run_cli_rejected(
        &["submit", "EMPLOYEE", "--request", "add", "--data", ada, "--actor", "maker"],
        &envs,
    );
    assert_eq!(pending.code, "APPROVAL_PENDING");

    let rows: Vec<serde_json::Value> = run_cli_json(&["read-all", "EMPLOYEE"], &envs);
    assert!(rows.is_empty(), "pending rows are not authoritative");

    let status: Status = run_cli_json(
        &["decide", "EMPLOYEE", "--action", "approve", "--key", r#"{"EMP_ID": 7}"#, "--actor", "checker"],
        &envs,
    );
    assert_eq!(status.code, "ACTION_SUCCESSFUL");
    assert_eq!(status.message, "APPROVE action successful");

    let rows: Vec<serde_json::Value> =
        run_cli_json(&["read", "EMPLOYEE", "--field", "EMP_ID", "--value", "7"], &envs);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["NAME"], "Ada");
    assert_eq!(rows[0]["ADDED_BY"], "maker");
    assert_eq!(rows[0]["APPROVE_BY"], "checker");

    let rows: Vec<serde_json::Value> = run_cli_json(&["read-all", "EMPLOYEE"], &envs);
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_validation_errors_are_reported_per_field() {
    let ws = Workspace::new();
    let status = run_cli_rejected(
        &["submit", "EMPLOYEE", "-r", "ADD", "-d", r#"{"EMP_ID": 9}"#, "--actor", "maker"],
        &ws.envs(),
    );
    assert_eq!(status.code, "VALIDATION_FAILED");
    assert!(status.errors.contains_key("NAME"), "{:?}", status.errors);
}

#[test]
fn test_rectify_round_trip() {
    let ws = Workspace::new();
    let envs = ws.envs();

    run_cli_json::<Status>(
        &["submit", "EMPLOYEE", "-r", "add", "-d", r#"{"EMP_ID": 3, "NAME": "Grace"}"#, "--actor", "maker"],
        &envs,
    );
    let status: Status = run_cli_json(
        &[
            "decide", "EMPLOYEE", "-a", "rectify", "-k", r#"{"EMP_ID": 3}"#,
            "--remarks", "add department", "--actor", "checker",
        ],
        &envs,
    );
    assert_eq!(status.code, "ACTION_SUCCESSFUL");

    let status: Status = run_cli_json(
        &["rectify", "EMPLOYEE", "-d", r#"{"EMP_ID": 3, "DEPT": "Ops"}"#, "--actor", "maker"],
        &envs,
    );
    assert_eq!(status.code, "RECTIFICATION_SUCCESSFUL");

    let again = run_cli_rejected(
        &["rectify", "EMPLOYEE", "-d", r#"{"EMP_ID": 3, "DEPT": "Ops"}"#, "--actor", "maker"],
        &envs,
    );
    assert_eq!(again.code, "NO_REQUEST_PENDING");
}

#[test]
fn test_reading_by_a_non_key_field_fails() {
    let ws = Workspace::new();
    let err = run_cli_json_error(
        &["read", "EMPLOYEE", "--field", "NAME", "--value", "Ada"],
        &ws.envs(),
    );
    assert_eq!(err["error"]["code"], "NOT_PRIMARY_KEY_FIELD");
}

#[test]
fn test_unknown_entity_is_a_metadata_error() {
    let ws = Workspace::new();
    let err = run_cli_json_error(&["read-all", "PAYROLL"], &ws.envs());
    assert_eq!(err["error"]["code"], "METADATA_ERROR");
}

#[test]
fn test_writes_require_an_actor() {
    let ws = Workspace::new();
    let err = run_cli_json_error(
        &["submit", "EMPLOYEE", "-r", "add", "-d", r#"{"EMP_ID": 1, "NAME": "A"}"#],
        &ws.envs(),
    );
    assert_eq!(err["error"]["code"], "COMMAND_FAILED");
}

#[test]
fn test_config_reports_resolved_paths() {
    let ws = Workspace::new();
    fs::write(ws.home.path().join("config.toml"), "actor = \"alice\"\n").unwrap();

    let config: serde_json::Value = run_cli_json(&["config"], &ws.envs());
    assert_eq!(config["actor"], "alice");
    assert_eq!(config["config"]["loaded"], true);
    assert_eq!(config["database"]["exists"], true);
    assert_eq!(config["catalog"]["exists"], true);
}
