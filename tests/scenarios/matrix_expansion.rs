//! Matrix expansion, exclusion and per-instance rendering

use crate::helpers::*;
use matrix_ci::core::config::WorkflowConfig;
use matrix_ci::core::{ConfigError, StepStatus};
use std::collections::HashSet;

const WORKFLOW: &str = r#"
name: cross
jobs:
  test:
    runs-on: ${{ matrix.os }}
    strategy:
      matrix:
        os: [ubuntu-latest, windows-latest]
        toolchain: [stable, nightly]
        exclude:
          - os: windows-latest
            toolchain: nightly
    env:
      RUSTUP_TOOLCHAIN: ${{ matrix.toolchain }}
    steps:
      - name: test on ${{ matrix.toolchain }}
        run: cargo +${{ matrix.toolchain }} test
        env:
          TARGET_OS: ${{ matrix.os }}
"#;

fn labels(run: &WorkflowTestResult) -> Vec<String> {
    run.result
        .instances
        .iter()
        .map(|r| r.instance.label())
        .collect()
}

#[tokio::test]
async fn test_cross_product_minus_exclusions() {
    let workflow = load(WORKFLOW);

    let run = run_with(&workflow, MockRunner::new(), MockFetcher::new()).await;

    assert_success(&run.result);
    assert_eq!(
        labels(&run),
        vec![
            "test (os=ubuntu-latest, toolchain=stable)",
            "test (os=ubuntu-latest, toolchain=nightly)",
            "test (os=windows-latest, toolchain=stable)",
        ]
    );
    assert_eq!(run.state.total_instances, 3);
}

#[tokio::test]
async fn test_instances_render_their_own_values() {
    let workflow = load(WORKFLOW);
    let runner = MockRunner::new();

    let run = run_with(&workflow, runner.clone(), MockFetcher::new()).await;

    let report = instance(&run.result, "test (os=windows-latest, toolchain=stable)");
    assert_eq!(report.runs_on, "windows-latest");
    assert_steps(report, &[("test on stable", StepStatus::Success)]);

    let invocation = runner
        .invocations()
        .into_iter()
        .find(|i| i.label == "test (os=ubuntu-latest, toolchain=nightly)")
        .unwrap();
    assert_eq!(invocation.script, "cargo +nightly test");
    assert_eq!(invocation.env["CI"], "true");
    assert_eq!(invocation.env["MATRIX_OS"], "ubuntu-latest");
    assert_eq!(invocation.env["MATRIX_TOOLCHAIN"], "nightly");
    assert_eq!(invocation.env["RUSTUP_TOOLCHAIN"], "nightly");
    assert_eq!(invocation.env["TARGET_OS"], "ubuntu-latest");
}

#[tokio::test]
async fn test_each_instance_gets_its_own_workspace() {
    let workflow = load(WORKFLOW);
    let runner = MockRunner::new();

    run_with(&workflow, runner.clone(), MockFetcher::new()).await;

    let dirs: HashSet<_> = runner.invocations().into_iter().map(|i| i.working_dir).collect();
    assert_eq!(dirs.len(), 3);
    assert!(dirs.iter().any(|d| d.ends_with("test-1")));
    assert!(dirs.iter().any(|d| d.ends_with("test-3")));
}

#[tokio::test]
async fn test_job_without_matrix_runs_once() {
    let workflow = load(
        r#"
jobs:
  lint:
    runs-on: ubuntu-latest
    steps:
      - run: cargo clippy
"#,
    );

    let run = run_with(&workflow, MockRunner::new(), MockFetcher::new()).await;

    assert_eq!(labels(&run), vec!["lint"]);
    assert_eq!(run.result.instances[0].runs_on, "ubuntu-latest");
}

#[test]
fn test_empty_axis_is_unsatisfiable() {
    let yaml = r#"
jobs:
  test:
    strategy:
      matrix:
        os: []
    steps:
      - run: cargo test
"#;
    let err = WorkflowConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("unsatisfiable"), "error: {}", err);
}

#[test]
fn test_excluding_everything_is_unsatisfiable() {
    let yaml = r#"
jobs:
  test:
    strategy:
      matrix:
        os: [ubuntu-latest]
        exclude:
          - os: ubuntu-latest
    steps:
      - run: cargo test
"#;
    let err = WorkflowConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("unsatisfiable"), "error: {}", err);
}

#[test]
fn test_template_on_unknown_axis_is_rejected() {
    let yaml = r#"
jobs:
  test:
    runs-on: ${{ matrix.platform }}
    strategy:
      matrix:
        os: [ubuntu-latest]
    steps:
      - run: cargo test
"#;
    let err = WorkflowConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidJob { .. }), "error: {:?}", err);
}
