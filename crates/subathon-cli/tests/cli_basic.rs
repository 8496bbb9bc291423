//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against an isolated data directory and
//! verify outputs.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde_json::Value;
use subathon_core::storage::{SnapshotStore, SqliteStore};

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_subathon-cli"));
    cmd.env("SUBATHON_DATA_DIR", data_dir)
        .env("SUBATHON_LOG", "warn")
        .env_remove("SUBATHON_ENV");
    cmd
}

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = cli(data_dir)
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn json(stdout: &str) -> Value {
    serde_json::from_str(stdout).expect("stdout should be one JSON document")
}

#[test]
fn test_parse() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["parse", "1h30m"]);
    assert_eq!(code, 0);
    let parsed = json(&stdout);
    assert_eq!(parsed["seconds"], 5400);
    assert_eq!(parsed["clock"], "1:30:00");
    assert_eq!(parsed["human"], "1h 30m");
}

#[test]
fn test_timer_status_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["timer", "status"]);
    assert_eq!(code, 0);
    let status = json(&stdout);
    assert_eq!(status["type"], "StateSnapshot");
    assert_eq!(status["state"], "running");
    assert!(status["remaining_secs"].as_f64().unwrap() <= 3600.0);
}

#[test]
fn test_timer_add_persists() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["timer", "add", "1h"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["type"], "TimeAdded");

    let (_, stdout, _) = run_cli(dir.path(), &["timer", "status"]);
    let remaining = json(&stdout)["remaining_secs"].as_f64().unwrap();
    assert!(remaining > 7000.0 && remaining <= 7200.0);
}

#[test]
fn test_timer_add_rejects_bad_duration() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["timer", "add", "soon"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error: invalid duration"));
}

#[test]
fn test_timer_toggle_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stdout, _) = run_cli(dir.path(), &["timer", "toggle"]);
    assert_eq!(json(&stdout)["type"], "TimerPaused");

    let (_, stdout, _) = run_cli(dir.path(), &["timer", "sub", "10m"]);
    assert_eq!(json(&stdout)["remaining_secs"].as_f64().unwrap(), 3000.0);

    let (_, stdout, _) = run_cli(dir.path(), &["timer", "reset"]);
    let reset = json(&stdout);
    assert_eq!(reset["type"], "TimerReset");
    assert_eq!(reset["remaining_secs"].as_f64().unwrap(), 3600.0);
}

#[test]
fn test_event_cheer() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["timer", "toggle"]);
    let envelope = r#"{"listener":"cheer-latest","event":{"type":"cheer","data":{"amount":500,"displayName":"Fan"}}}"#;
    let (code, stdout, _) = run_cli(dir.path(), &["event", envelope]);
    assert_eq!(code, 0);
    let handled = json(&stdout);
    assert_eq!(handled["events"][0]["type"], "TimeAdded");
    assert_eq!(handled["events"][0]["seconds"].as_f64().unwrap(), 50.0);
}

#[test]
fn test_event_unauthorized_command_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let envelope = r#"{"listener":"message-received","event":{"data":{"text":"!subtime 10m","displayName":"Viewer"}}}"#;
    let (code, stdout, _) = run_cli(dir.path(), &["event", envelope]);
    assert_eq!(code, 0);
    let handled = json(&stdout);
    assert_eq!(handled["events"].as_array().unwrap().len(), 0);
    assert!(handled["feedback"].is_null());
}

#[test]
fn test_event_saves_timer_that_ran_out() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["config", "set", "timer.start_seconds", "1"]);
    run_cli(dir.path(), &["timer", "reset"]);
    std::thread::sleep(Duration::from_millis(1_500));

    // Not a mutation, but the catch-up tick hit zero.
    let envelope = r#"{"listener":"message-received","event":{"data":{"text":"hello","displayName":"Viewer"}}}"#;
    let (code, stdout, _) = run_cli(dir.path(), &["event", envelope]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["events"].as_array().unwrap().len(), 0);

    let store = SqliteStore::open_at(&dir.path().join("subathon.db")).unwrap();
    let stored = store.get("subathon-timer-v1").unwrap().unwrap();
    assert_eq!(stored.remaining_secs, 0.0);
    assert!(!stored.is_running);
}

#[test]
fn test_config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "commands.add_command"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "!addtime");

    let (code, stdout, _) = run_cli(dir.path(), &["config", "set", "timer.start_seconds", "120"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "timer.start_seconds = 120");
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "timer.start_seconds"]);
    assert_eq!(stdout.trim(), "120");

    let (_, stdout, _) = run_cli(dir.path(), &["timer", "reset"]);
    assert_eq!(json(&stdout)["remaining_secs"].as_f64().unwrap(), 120.0);
}

#[test]
fn test_config_show_section_is_toml() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "show", "commands"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("add_command = \"!addtime\""));
    assert!(!stdout.contains("[timer]"));
}

#[test]
fn test_config_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["config", "get", "nope.missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_run_reads_events_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = cli(dir.path())
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn run");

    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(
            stdin,
            r#"{{"listener":"message-received","event":{{"data":{{"text":"!addtime 5m","displayName":"Mod","tags":{{"badges":"moderator/1"}}}}}}}}"#
        )
        .unwrap();
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Subathon Time Remaining: "));
    assert!(stdout.contains("> Mod added 5m → "));

    let (_, status, _) = run_cli(dir.path(), &["timer", "status"]);
    let remaining = json(&status)["remaining_secs"].as_f64().unwrap();
    assert!(remaining > 3600.0);
}
