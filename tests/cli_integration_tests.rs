// CLI integration tests: replay, watch and config commands against fixture logs

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Binary run from an empty directory so no stray tutor.toml or .env is picked up.
fn tutor_guard(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tutor-guard").unwrap();
    cmd.current_dir(workdir.path())
        .env_remove("RUST_LOG")
        .env_remove("TUTOR__GESTURES__ACTIVATION_THRESHOLD");
    cmd
}

#[test]
fn test_replay_absence_log_shows_lock_sequence() {
    let workdir = TempDir::new().unwrap();
    tutor_guard(&workdir)
        .arg("replay")
        .arg(fixture("absence_lock.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("900ms  stage    warning"))
        .stdout(predicate::str::contains("2400ms  stage    locked"))
        .stdout(predicate::str::contains("unlock   from locked"))
        .stdout(predicate::str::contains("Final stage: monitoring"));
}

#[test]
fn test_replay_json_output() {
    let workdir = TempDir::new().unwrap();
    let output = tutor_guard(&workdir)
        .args(["replay", "--json"])
        .arg(fixture("gestures.jsonl"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let actions: Vec<_> = outcome["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|event| event["event"] == "action")
        .map(|event| event["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, vec!["toggle_control_mode", "play_pause"]);
    assert_eq!(outcome["final_stage"], "monitoring");
    assert_eq!(outcome["metrics"]["ticks"], 28);
}

#[test]
fn test_replay_malformed_log_reports_line() {
    let workdir = TempDir::new().unwrap();
    tutor_guard(&workdir)
        .arg("replay")
        .arg(fixture("malformed.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Line 2"));
}

#[test]
fn test_replay_missing_log() {
    let workdir = TempDir::new().unwrap();
    tutor_guard(&workdir)
        .args(["replay", "does-not-exist.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.jsonl"));
}

#[test]
fn test_config_file_overrides_thresholds() {
    let workdir = TempDir::new().unwrap();
    let config_path = workdir.path().join("strict.toml");
    std::fs::write(&config_path, "[gestures]\nactivation_threshold = 20\n").unwrap();

    tutor_guard(&workdir)
        .arg("--config")
        .arg(&config_path)
        .arg("replay")
        .arg(fixture("gestures.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("action   toggle_control_mode").not())
        .stdout(predicate::str::contains("0 triggers"));
}

#[test]
fn test_default_config_file_in_working_directory() {
    let workdir = TempDir::new().unwrap();
    std::fs::write(
        workdir.path().join("tutor.toml"),
        "[security]\nabsence_grace_ticks = 40\n",
    )
    .unwrap();

    tutor_guard(&workdir)
        .arg("replay")
        .arg(fixture("absence_lock.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("stage    warning").not())
        .stdout(predicate::str::contains("unlock   from monitoring"));
}

#[test]
fn test_environment_overrides_thresholds() {
    let workdir = TempDir::new().unwrap();
    tutor_guard(&workdir)
        .env("TUTOR__GESTURES__ACTIVATION_THRESHOLD", "20")
        .args(["replay", "--json"])
        .arg(fixture("gestures.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"gesture_triggers\": 0"));
}

#[test]
fn test_show_config_prints_defaults() {
    let workdir = TempDir::new().unwrap();
    tutor_guard(&workdir)
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[gestures]"))
        .stdout(predicate::str::contains("activation_threshold = 8"))
        .stdout(predicate::str::contains("absence_grace_ticks = 10"));
}

#[test]
fn test_check_config_rejects_invalid_values() {
    let workdir = TempDir::new().unwrap();
    std::fs::write(
        workdir.path().join("tutor.toml"),
        "[gestures]\nactivation_threshold = 0\n",
    )
    .unwrap();

    tutor_guard(&workdir)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gestures.activation_threshold"));
}

#[test]
fn test_check_config_accepts_defaults() {
    let workdir = TempDir::new().unwrap();
    tutor_guard(&workdir)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"));
}

#[test]
fn test_watch_streams_events_from_stdin() {
    let workdir = TempDir::new().unwrap();
    let log = std::fs::read_to_string(fixture("absence_lock.jsonl")).unwrap();

    tutor_guard(&workdir)
        .arg("watch")
        .write_stdin(log)
        .assert()
        .success()
        .stdout(predicate::str::contains("stage    locked"))
        .stdout(predicate::str::contains("\"final_stage\":\"monitoring\""));
}

#[test]
fn test_watch_skips_malformed_lines() {
    let workdir = TempDir::new().unwrap();
    tutor_guard(&workdir)
        .args(["watch", "--input"])
        .arg(fixture("malformed.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ticks\":1"));
}

#[test]
fn test_watch_queue_depth_does_not_change_events() {
    let workdir = TempDir::new().unwrap();
    let log = std::fs::read_to_string(fixture("absence_lock.jsonl")).unwrap();

    let events = |queue: &str| {
        let output = tutor_guard(&workdir)
            .args(["watch", "--queue", queue])
            .write_stdin(log.clone())
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        // Last line is the summary, which carries a fresh session id
        let mut lines: Vec<String> = stdout.lines().map(str::to_string).collect();
        let summary: serde_json::Value = serde_json::from_str(&lines.pop().unwrap()).unwrap();
        (lines, summary["metrics"]["ticks"].clone())
    };

    let (shallow, shallow_ticks) = events("1");
    let (deep, deep_ticks) = events("256");
    assert!(shallow.iter().any(|line| line.contains("stage    locked")));
    assert_eq!(shallow, deep);
    assert_eq!(shallow_ticks, deep_ticks);
}
