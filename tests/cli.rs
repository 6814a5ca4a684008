use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn cardguard() -> Command {
    let mut cmd = Command::cargo_bin("cardguard").unwrap();
    // Keep host config out of the tests
    cmd.env("CARDGUARD_CONFIG", "/nonexistent-cardguard.toml");
    cmd
}

#[test]
fn test_cli_help() {
    cardguard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_version() {
    cardguard()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_scan_reports_detection() {
    cardguard()
        .args(["scan", "pay with 4111 1111 1111 1111 today"])
        .assert()
        .success()
        .stdout(predicate::str::contains("visa"))
        .stdout(predicate::str::contains("1 detections"));
}

#[test]
fn test_scan_redacts_matches() {
    cardguard()
        .args(["scan", "--redact", "pay with 4111111111111111 today"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pay with [REDACTED] today"));
}

#[test]
fn test_scan_masks_down_to_last_four() {
    cardguard()
        .args(["scan", "--mask", "card 4111111111111111"])
        .assert()
        .success()
        .stdout(predicate::str::contains("************1111"));
}

#[test]
fn test_scan_robot_emits_parseable_outcome() {
    let output = cardguard()
        .args(["--robot", "scan", "card 4111111111111111 here"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["outcome"]["state"], "completed");
    assert_eq!(payload["outcome"]["total_detections"], 1);
}

#[test]
fn test_scan_with_forced_strategy() {
    let output = cardguard()
        .args([
            "--robot",
            "scan",
            "--strategy",
            "sequential",
            "card 4111111111111111",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["outcome"]["strategy"], "sequential");
}

#[test]
fn test_scan_without_input_fails() {
    cardguard().arg("scan").assert().failure();
}

#[test]
fn test_scan_file_input() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("batch.txt");
    std::fs::write(
        &path,
        "first 4111111111111111\nsecond clean line\nthird 5500005555555559\n",
    )
    .unwrap();

    let output = cardguard()
        .args(["--robot", "scan", "--file", path.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["outcome"]["items_total"], 3);
    assert_eq!(payload["outcome"]["total_detections"], 2);
}

#[test]
fn test_status_robot_reports_level() {
    let output = cardguard()
        .args(["--robot", "status"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert!(payload["level"].is_string());
    assert_eq!(payload["active_skills"], 1);
}

#[test]
fn test_skills_lists_base_skill() {
    cardguard()
        .arg("skills")
        .assert()
        .success()
        .stdout(predicate::str::contains("base-luhn"));
}

#[test]
fn test_feedback_updates_counters() {
    let output = cardguard()
        .args([
            "--robot", "feedback", "base-luhn", "--tp", "8", "--fp", "1", "--fn", "1",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["record"]["true_positives"], 8);
}

#[test]
fn test_feedback_for_unknown_skill_fails() {
    cardguard()
        .args(["feedback", "ghost", "--tp", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_robot_mode_error_envelope() {
    let output = cardguard()
        .args(["--robot", "feedback", "ghost", "--tp", "1"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["error"], true);
}

#[test]
fn test_constraints_update_roundtrip() {
    let output = cardguard()
        .args(["--robot", "constraints", "--max-cpu", "50", "--max-concurrent", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["max_cpu_percent"], 50.0);
    assert_eq!(payload["max_concurrent_tasks"], 2);
}

#[test]
fn test_constraints_rejects_out_of_range() {
    cardguard()
        .args(["constraints", "--max-cpu", "150"])
        .assert()
        .failure();
}

#[test]
fn test_analyze_registers_skill_for_covered_gap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corpus.jsonl");
    // Dot-separated cards sit outside the built-in pattern
    let mut lines = String::new();
    for _ in 0..3 {
        lines.push_str(
            r#"{"text":"x 4111.1111.1111.1111 y","expected":[{"start":2,"end":21}]}"#,
        );
        lines.push('\n');
    }
    std::fs::write(&path, lines).unwrap();

    let output = cardguard()
        .args(["--robot", "analyze", "--corpus", path.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["registered"].as_array().unwrap().len(), 1);
    assert_eq!(payload["report"]["total_missed"], 3);
}

#[test]
fn test_analyze_with_missing_corpus_fails() {
    cardguard()
        .args(["analyze", "--corpus", "/nonexistent.jsonl"])
        .assert()
        .failure();
}

#[test]
fn test_benchmark_times_every_strategy() {
    let output = cardguard()
        .args(["--robot", "benchmark", "--items", "20"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["entries"].as_array().unwrap().len(), 5);
}

#[test]
fn test_config_file_overrides_constraints() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[constraints]
max_cpu_percent = 70.0
max_memory_percent = 70.0
max_batch_size = 50
max_concurrent_tasks = 2
"#,
    )
    .unwrap();

    let output = Command::cargo_bin("cardguard")
        .unwrap()
        .args(["--robot", "--config", path.to_str().unwrap(), "constraints"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let payload: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(payload["max_batch_size"], 50);
}
