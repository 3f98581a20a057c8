use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal config for the simulator backend; everything else takes defaults
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[servo]
kp = 0.05
ki = 0.0055
kd = 0.001

[feeder]
loop_interval_ms = 20

[sim]
start_ticks = 0
# virtual clock: moves finish as fast as the host allows
realtime = false
{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["move", "--to", "1000"], 0, "move complete", "stdout")]
#[case(&["move", "--to", "-500"], 0, "(settled)", "stdout")]
#[case(&["feed", "--tenths", "10"], 0, "feed complete: target 225", "stdout")]
#[case(&["move"], 2, "required", "stderr")]
#[case(&["move", "--to", "5000", "--deadline-ms", "1"], 3, "deadline", "stderr")]
#[case(&["self-check"], 0, "self-check ok (sim): position 0", "stdout")]
#[case(&["peel", "--direction", "forward", "--ms", "200"], 0, "peel FORWARD at 100% for 200 ms", "stdout")]
#[case(&["peel", "--direction", "reverse", "--speed", "140"], 1, "out of range", "stderr")]
#[case(&["profile", "--runs", "2"], 0, "suggested gains: kp=", "stdout")]
#[case(&["profile", "--moves", "-300,300", "--runs", "1"], 0, "move -300: 1/1 settled", "stdout")]
#[case(&["profile", "--runs", "0"], 2, "runs", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("warn");
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn stalled_plant_hits_deadline() {
    let dir = tempdir().unwrap();
    // the PWM window never clears the stall duty, so the tape cannot move
    let cfg = write_config(&dir, "stall_duty = 99.0");

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("move").arg("--to").arg("2000");
    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("did not finish before its deadline"));
}

#[rstest]
fn encoder_fault_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.env("FEEDER_TEST_SIM_FAULT", "1");
    cmd.arg("--config").arg(&cfg).arg("self-check");
    cmd.assert().code(1).stderr(predicate::str::contains(
        "What happened: The feeder hardware reported a fault",
    ));
}

#[rstest]
#[case("[servo]\nmax_output = 0.0\n", "servo.max_output")]
#[case("[servo]\nupdates = 0\n", "servo.updates")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
fn invalid_config_names_the_key(#[case] toml: &str, #[case] key: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--config").arg(&path).arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains(key));
}

#[rstest]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Could not read the config file"));
}

#[rstest]
fn log_file_sink_is_written() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("feeder.log");
    let extra = format!(
        "\n[logging]\nfile = {:?}\nlevel = \"info\"\n",
        log.display().to_string()
    );
    let cfg = write_config(&dir, &extra);

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("move").arg("--to").arg("300");
    cmd.assert().success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("move complete"), "log was: {text}");
}

#[rstest]
fn profile_json_reports_each_round() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("feeder_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["profile", "--moves", "600,-600", "--runs", "2", "--rounds", "2"]);
    let out = cmd.assert().code(0).get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let rounds: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|l| l.contains("\"profile\""))
        .map(|l| serde_json::from_str(l).expect("valid JSON"))
        .collect();
    assert_eq!(rounds.len(), 2, "stdout was: {stdout}");

    for (i, r) in rounds.iter().enumerate() {
        assert_eq!(r["round"], (i + 1) as u64);
        assert_eq!(r["backend"], "sim");
        let moves = r["moves"].as_array().unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0]["relative"], 600);
        assert_eq!(moves[1]["relative"], -600);
        assert_eq!(moves[0]["attempted"], 2);
        for m in moves {
            let attempted = m["attempted"].as_u64().unwrap();
            let done = m["completed"].as_u64().unwrap() + m["timed_out"].as_u64().unwrap();
            assert_eq!(done, attempted);
        }
        assert!(r["suggested"]["kp"].as_f64().unwrap() > 0.0);
    }
    // round two runs with what round one suggested
    assert_eq!(rounds[1]["gains"], rounds[0]["suggested"]);
}
