//! End-to-end tests of `mobperf compare` and `mobperf summarize`

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

mod common;
use common::assertions::assert_approx_eq;
use common::fixtures;
use common::mobperf;

const BASELINE: &[f64] = &[100.0, 102.0, 98.0, 101.0, 99.0];
const SLOWER: &[f64] = &[140.0, 138.0, 142.0, 141.0, 139.0];

/// Workspace with `baseline/` and `candidate/` result directories
fn sessions(baseline: &[f64], candidate: &[f64]) -> TempDir {
    let temp = TempDir::new().unwrap();
    fixtures::write_result_set(&temp.path().join("baseline"), "launch.total-time", baseline)
        .unwrap();
    fixtures::write_result_set(
        &temp.path().join("candidate"),
        "launch.total-time",
        candidate,
    )
    .unwrap();
    temp
}

#[test]
fn test_compare_reports_regression_and_writes_report() {
    let temp = sessions(BASELINE, SLOWER);

    mobperf()
        .args(["compare", "baseline", "candidate"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("launch.total-time"))
        .stdout(predicate::str::contains("regressed"))
        .stdout(predicate::str::contains("+40.0%"));

    let report = fs::read_to_string(temp.path().join("candidate/comparison-report.txt")).unwrap();
    assert!(report.contains("1 regressed, 0 improved, 0 unchanged, 0 insufficient-data"));
}

#[test]
fn test_compare_swapped_inputs_report_improvement() {
    let temp = sessions(BASELINE, SLOWER);

    mobperf()
        .args(["compare", "candidate", "baseline"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("improved"));
}

#[test]
fn test_compare_json_output_is_parseable() {
    let temp = sessions(BASELINE, SLOWER);

    let output = mobperf()
        .args(["compare", "baseline", "candidate", "--json"])
        .current_dir(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let first = &results[0];
    assert_eq!(first["key"], "launch.total-time");
    assert_eq!(first["verdict"], "regressed");
    assert_eq!(first["polarity"], "higher-is-worse");
    assert_approx_eq(first["deltaMean"].as_f64().unwrap(), 40.0, 1e-9);
    assert_approx_eq(first["deltaPercent"].as_f64().unwrap(), 40.0, 1e-9);
    assert_eq!(first["baseline"]["n"], 5);
}

#[test]
fn test_compare_json_sends_warnings_to_stderr() {
    let temp = TempDir::new().unwrap();
    fixtures::write_failed_result_set(&temp.path().join("baseline"), 2).unwrap();
    fixtures::write_failed_result_set(&temp.path().join("candidate"), 2).unwrap();

    let output = mobperf()
        .args(["compare", "baseline", "candidate", "--json"])
        .current_dir(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results, serde_json::json!([]));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no report written"), "{}", stderr);
    assert!(!temp.path().join("candidate/comparison-report.txt").exists());
}

#[test]
fn test_compare_fail_on_regression_exits_one() {
    let temp = sessions(BASELINE, SLOWER);

    mobperf()
        .args(["compare", "baseline", "candidate", "--fail-on-regression"])
        .current_dir(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("launch.total-time"))
        .stderr(predicate::str::contains("performance regression detected"));
}

#[test]
fn test_compare_fail_on_regression_passes_when_unchanged() {
    let temp = sessions(BASELINE, BASELINE);

    mobperf()
        .args(["compare", "baseline", "candidate", "--fail-on-regression"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 regressed, 0 improved, 1 unchanged"));
}

#[test]
fn test_compare_thresholds_from_config_file() {
    let temp = sessions(BASELINE, SLOWER);
    fs::write(
        temp.path().join(".mobperf.toml"),
        "[compare]\nmin-samples = 10\n",
    )
    .unwrap();

    mobperf()
        .args(["compare", "baseline", "candidate"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("insufficient-data"));
}

#[test]
fn test_compare_flag_overrides_config_file() {
    let temp = sessions(BASELINE, SLOWER);
    fs::write(
        temp.path().join(".mobperf.toml"),
        "[compare]\nmin-samples = 10\n",
    )
    .unwrap();

    mobperf()
        .args(["compare", "baseline", "candidate", "--min-samples", "3"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("regressed"));
}

#[test]
fn test_compare_missing_raw_data_writes_no_report() {
    let temp = sessions(BASELINE, SLOWER);
    fs::create_dir(temp.path().join("empty")).unwrap();

    mobperf()
        .args(["compare", "baseline", "empty"])
        .current_dir(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "candidate directory has no raw-results.json",
        ))
        .stderr(predicate::str::contains("mobperf run"));

    assert!(!temp.path().join("empty/comparison-report.txt").exists());
}

#[test]
fn test_compare_missing_directory_is_rejected() {
    let temp = sessions(BASELINE, SLOWER);

    mobperf()
        .args(["compare", "nowhere", "candidate"])
        .current_dir(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("baseline directory not found"));
}

#[test]
fn test_compare_same_location_is_rejected() {
    let temp = sessions(BASELINE, SLOWER);

    mobperf()
        .args(["compare", "baseline", "./baseline/"])
        .current_dir(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("same location"));
}

#[test]
fn test_compare_unparsable_raw_data_is_rejected() {
    let temp = sessions(BASELINE, SLOWER);
    fs::write(temp.path().join("candidate/raw-results.json"), "{ not json").unwrap();

    mobperf()
        .args(["compare", "baseline", "candidate"])
        .current_dir(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("candidate raw results are unreadable"));
}

#[test]
fn test_compare_explicit_output_path() {
    let temp = sessions(BASELINE, SLOWER);

    mobperf()
        .args([
            "compare",
            "baseline",
            "candidate",
            "--output",
            "reports/diff.txt",
        ])
        .current_dir(temp.path())
        .assert()
        .success();

    assert!(temp.path().join("reports/diff.txt").exists());
    assert!(!temp.path().join("candidate/comparison-report.txt").exists());
}

#[test]
fn test_summarize_rewrites_summary_report() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("session");
    fixtures::write_result_set(&dir, "launch.total-time", BASELINE).unwrap();

    mobperf()
        .arg("summarize")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Performance Summary: app"))
        .stdout(predicate::str::contains("launch.total-time"));

    let report = fs::read_to_string(dir.join("summary-report.txt")).unwrap();
    assert!(report.contains("Runs: 5 succeeded, 0 failed, 5 requested"));
}

#[test]
fn test_summarize_all_failed_session_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("session");
    fixtures::write_failed_result_set(&dir, 2).unwrap();

    mobperf()
        .arg("summarize")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("run 2: launch failed: exited with code 1"));

    assert!(!dir.join("summary-report.txt").exists());
}

#[test]
fn test_summarize_missing_raw_data_fails() {
    let temp = TempDir::new().unwrap();

    mobperf()
        .arg("summarize")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no raw-results.json"));
}
