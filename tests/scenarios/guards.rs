//! Step guards evaluated per matrix instance

use crate::helpers::*;
use matrix_ci::core::config::WorkflowConfig;
use matrix_ci::core::{ConfigError, ExitSignal, StepStatus};
use matrix_ci::execution::ExecutionEvent;

const WORKFLOW: &str = r#"
name: guards
jobs:
  test:
    strategy:
      matrix:
        os: [ubuntu-latest, macos-latest]
    steps:
      - name: install-linux-deps
        if: matrix.os == 'ubuntu-latest'
        run: sudo apt-get install -y libssl-dev
      - name: install-mac-deps
        if: ${{ startsWith(matrix.os, 'macos') }}
        run: brew install openssl
      - name: run-tests
        run: cargo test
"#;

#[tokio::test]
async fn test_false_guard_skips_and_continues() {
    let workflow = load(WORKFLOW);
    let runner = MockRunner::new();

    let run = run_with(&workflow, runner.clone(), MockFetcher::new()).await;

    assert_success(&run.result);
    assert_steps(
        instance(&run.result, "test (os=ubuntu-latest)"),
        &[
            ("install-linux-deps", StepStatus::Success),
            ("install-mac-deps", StepStatus::Skipped),
            ("run-tests", StepStatus::Success),
        ],
    );
    assert_steps(
        instance(&run.result, "test (os=macos-latest)"),
        &[
            ("install-linux-deps", StepStatus::Skipped),
            ("install-mac-deps", StepStatus::Success),
            ("run-tests", StepStatus::Success),
        ],
    );

    assert_eq!(
        runner.scripts_for("test (os=macos-latest)"),
        vec!["brew install openssl", "cargo test"]
    );
}

#[tokio::test]
async fn test_skipped_steps_have_no_exit() {
    let workflow = load(WORKFLOW);

    let run = run_with(&workflow, MockRunner::new(), MockFetcher::new()).await;

    let report = instance(&run.result, "test (os=ubuntu-latest)");
    let skipped = report.step("install-mac-deps").unwrap();
    assert_eq!(skipped.exit, None);

    let skip_events = run
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::StepSkipped { .. }))
        .count();
    assert_eq!(skip_events, 2);
}

#[tokio::test]
async fn test_guarded_out_failure_does_not_fail_run() {
    let workflow = load(WORKFLOW);
    // Would fail, but only ever runs on macOS
    let runner = MockRunner::new().fail_on("ubuntu", "brew", ExitSignal::Code(1));

    let run = run_with(&workflow, runner, MockFetcher::new()).await;

    assert_success(&run.result);
}

#[tokio::test]
async fn test_failure_only_in_one_instance() {
    let workflow = load(WORKFLOW);
    let runner = MockRunner::new().fail_on("macos", "cargo test", ExitSignal::Code(101));

    let run = run_with(&workflow, runner, MockFetcher::new()).await;

    assert!(!run.result.is_success());
    assert!(instance(&run.result, "test (os=ubuntu-latest)").outcome.is_success());

    let failures = run.result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].combination, "os=macos-latest");
    assert_eq!(failures[0].step_index, 3);
}

#[test]
fn test_guard_on_unknown_axis_is_rejected_at_load() {
    let yaml = r#"
jobs:
  test:
    strategy:
      matrix:
        os: [ubuntu-latest]
    steps:
      - if: matrix.arch == 'arm64'
        run: echo arm
"#;
    let err = WorkflowConfig::from_yaml(yaml)
        .and_then(|config| config.to_workflow())
        .unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidStep { .. } | ConfigError::InvalidGuard { .. }),
        "unexpected error: {:?}",
        err
    );
    assert!(err.to_string().contains("arch"), "error: {}", err);
}

#[test]
fn test_malformed_guard_is_rejected_at_load() {
    let yaml = r#"
jobs:
  test:
    steps:
      - if: matrix.os ==
        run: echo broken
"#;
    assert!(WorkflowConfig::from_yaml(yaml)
        .and_then(|config| config.to_workflow())
        .is_err());
}
