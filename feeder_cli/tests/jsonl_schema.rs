use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, sim_extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[feeder]
loop_interval_ms = 20
forward_ms = 1000
deadline_factor = 2.0

[sim]
realtime = false
{sim_extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn result_line(stdout: &[u8]) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .find(|l| l.contains("\"final_position\""))
        .unwrap_or("")
        .to_string();
    assert!(
        !line.is_empty(),
        "no JSONL line with final_position found; stdout was: {stdout}"
    );
    serde_json::from_str(&line).expect("valid JSON")
}

/// Validate the JSONL schema for a successful move.
#[rstest]
fn jsonl_success_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("move")
        .arg("--to")
        .arg("800");

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = result_line(&out);

    assert!(v.get("timestamp").and_then(|x| x.as_i64()).is_some());
    assert_eq!(v["command"], "move");
    assert_eq!(v["backend"], "sim");
    assert_eq!(v["target"], 800);
    assert_eq!(v["start_position"], 0);
    assert!(v["error"].as_i64().unwrap().abs() <= 15);
    assert_eq!(v["outcome"], "settled");
    for key in ["ticks", "duration_ms", "worst_tick_us", "missed_periods"] {
        assert!(v.get(key).and_then(|x| x.as_u64()).is_some(), "{key}");
    }
    assert!(v.get("abort_reason").is_some());
    assert!(v["abort_reason"].is_null());
}

/// Validate the JSONL schema for an aborted move, and the error object on stderr.
#[rstest]
fn jsonl_abort_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "stall_duty = 99.0");

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("move")
        .arg("--to")
        .arg("1000");

    let assert = cmd.assert().code(3);
    let out = assert.get_output();
    let v = result_line(&out.stdout);
    assert_eq!(v["abort_reason"], "Deadline");
    assert!(v["outcome"].is_null());
    assert_eq!(v["final_position"], 0);

    let stderr = String::from_utf8_lossy(&out.stderr);
    let err_line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .expect("error JSON on stderr");
    let e: serde_json::Value = serde_json::from_str(err_line).expect("valid JSON");
    assert_eq!(e["reason"], "Deadline");
    assert_eq!(e["details"]["deadline_ms"], 2000);
}

#[rstest]
fn jsonl_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "start_ticks = 1234");
    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("self-check");
    let out = cmd.assert().success().get_output().stdout.clone();
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out).trim()).expect("one JSON line");
    assert_eq!(v["self_check"], "ok");
    assert_eq!(v["position"], 1234);
}
