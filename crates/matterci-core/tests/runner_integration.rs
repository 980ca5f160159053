//! Integration tests for the certification test runner with RecordingDut.

use matterci_core::dut::FACTORY_RESET_COMMAND;
use matterci_core::fakes::RecordingDut;
use matterci_core::runner::{run_all, run_test_case, select_chunk, RunnerConfig, TestOutcome};
use matterci_core::TestCase;
use std::path::PathBuf;

const PASS_LINE: &str = "INFO:root:Final result: PASS !";

fn fast_config() -> RunnerConfig {
    RunnerConfig {
        max_attempts: 2,
        test_timeout_secs: 30,
        retry_backoff_secs: 0,
        post_test_delay_secs: 0,
        cleanup_dirs: vec![],
    }
}

fn passing_case(name: &str) -> TestCase {
    TestCase {
        name: name.to_string(),
        command: format!("echo '{PASS_LINE}'"),
    }
}

fn failing_case(name: &str) -> TestCase {
    TestCase {
        name: name.to_string(),
        command: "echo 'INFO:root:Final result: FAIL !'".to_string(),
    }
}

/// Test: a passing test runs once and resets the device exactly once
/// (the unconditional post-test reset).
#[tokio::test]
async fn test_passing_test_single_attempt() {
    let mut dut = RecordingDut::new();
    let config = fast_config();

    let result = run_test_case(&mut dut, &passing_case("pairing"), &config)
        .await
        .expect("run failed");

    assert_eq!(result.outcome, TestOutcome::Pass);
    assert_eq!(result.test_case_name, "pairing");
    assert_eq!(
        dut.commands,
        vec![FACTORY_RESET_COMMAND.to_string()],
        "pass path issues only the post-test reset"
    );
}

/// Test: an always-failing test is invoked exactly max_attempts times
/// and triggers exactly max_attempts device resets (attempts-1 retry
/// resets plus the post-test reset).
#[tokio::test]
async fn test_retry_bound_and_reset_count() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let marker = dir.path().join("attempts.log");

    let mut dut = RecordingDut::new();
    let config = fast_config();
    let case = TestCase {
        name: "flaky".to_string(),
        command: format!("echo attempt >> {}", marker.display()),
    };

    let result = run_test_case(&mut dut, &case, &config)
        .await
        .expect("run failed");

    assert_eq!(result.outcome, TestOutcome::Fail);

    let attempts = std::fs::read_to_string(&marker).expect("marker missing");
    assert_eq!(
        attempts.lines().count(),
        config.max_attempts as usize,
        "command invoked exactly max_attempts times"
    );
    assert_eq!(
        dut.commands.len(),
        config.max_attempts as usize,
        "one reset per failed retry plus the post-test reset"
    );
    assert!(dut.commands.iter().all(|c| c == FACTORY_RESET_COMMAND));
}

/// Test: a failure does not abort subsequent test cases, and results
/// keep manifest order.
#[tokio::test]
async fn test_failure_does_not_abort_remaining_cases() {
    let mut dut = RecordingDut::new();
    let config = fast_config();
    let cases = vec![
        failing_case("first"),
        passing_case("second"),
        passing_case("third"),
    ];

    let results = run_all(&mut dut, &cases, &config).await.expect("run failed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].outcome, TestOutcome::Fail);
    assert_eq!(results[1].outcome, TestOutcome::Pass);
    assert_eq!(results[2].outcome, TestOutcome::Pass);

    let names: Vec<&str> = results.iter().map(|r| r.test_case_name.as_str()).collect();
    assert_eq!(names, ["first", "second", "third"]);
}

/// Test: scratch directories are wiped on the pass path.
#[tokio::test]
async fn test_cleanup_dirs_removed_on_pass() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let scratch = dir.path().join("chip_storage");
    std::fs::create_dir_all(scratch.join("nested")).expect("mkdir failed");

    let mut dut = RecordingDut::new();
    let config = RunnerConfig {
        cleanup_dirs: vec![scratch.clone()],
        ..fast_config()
    };

    let result = run_test_case(&mut dut, &passing_case("clean"), &config)
        .await
        .expect("run failed");

    assert_eq!(result.outcome, TestOutcome::Pass);
    assert!(!scratch.exists(), "scratch directory should be removed");
}

/// Test: a missing cleanup directory is not an error.
#[tokio::test]
async fn test_cleanup_missing_dir_is_harmless() {
    let mut dut = RecordingDut::new();
    let config = RunnerConfig {
        cleanup_dirs: vec![PathBuf::from("/nonexistent/scratch/dir")],
        ..fast_config()
    };

    let result = run_test_case(&mut dut, &passing_case("ok"), &config)
        .await
        .expect("run failed");
    assert_eq!(result.outcome, TestOutcome::Pass);
}

/// Test: a command that exceeds its deadline counts as a failed attempt.
#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let mut dut = RecordingDut::new();
    let config = RunnerConfig {
        max_attempts: 1,
        test_timeout_secs: 1,
        ..fast_config()
    };
    let case = TestCase {
        name: "hang".to_string(),
        command: format!("sleep 5 && echo '{PASS_LINE}'"),
    };

    let result = run_test_case(&mut dut, &case, &config)
        .await
        .expect("run failed");

    assert_eq!(result.outcome, TestOutcome::Fail);
    assert_eq!(dut.commands.len(), 1, "post-test reset still issued");
}

/// Test: running a selected chunk covers exactly that chunk's cases.
#[tokio::test]
async fn test_chunked_run_covers_selected_half() {
    let cases: Vec<TestCase> = (0..5)
        .map(|i| passing_case(&format!("t{i}")))
        .collect();

    let mut dut = RecordingDut::new();
    let config = fast_config();

    let second = select_chunk(&cases, "2");
    let results = run_all(&mut dut, second, &config).await.expect("run failed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].test_case_name, "t3");
    assert_eq!(results[1].test_case_name, "t4");
}
