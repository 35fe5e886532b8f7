//! The workflow written by `init`: provision, fetch, test, format check

use crate::helpers::*;
use matrix_ci::core::config::DEFAULT_WORKFLOW;
use matrix_ci::core::{ExitSignal, JobError, PipelineStatus, StepStatus, Trigger};
use matrix_ci::execution::{aggregate, ExecutionEvent};

const LABEL: &str = "test (os=ubuntu-latest)";

#[tokio::test]
async fn test_default_workflow_passes() {
    let workflow = load(DEFAULT_WORKFLOW);
    let runner = MockRunner::new();
    let fetcher = MockFetcher::new();

    let run = run_with(&workflow, runner.clone(), fetcher.clone()).await;

    assert_success(&run.result);
    assert_eq!(run.result.instances.len(), 1);
    assert_eq!(run.result.summary(), "CI: Success (1 of 1 instance(s) passed)");

    let report = instance(&run.result, LABEL);
    assert_eq!(report.runs_on, "ubuntu-latest");
    assert_steps(
        report,
        &[
            ("install-tools", StepStatus::Success),
            ("checkout", StepStatus::Success),
            ("run-tests", StepStatus::Success),
            ("run-format-check", StepStatus::Success),
        ],
    );

    // Setup runs before the checkout, the body after it
    let scripts = runner.scripts_for(LABEL);
    assert_eq!(scripts.len(), 3);
    assert!(scripts[0].contains("apt-get install"));
    assert!(scripts[1].contains("cargo test"));
    assert!(scripts[2].contains("cargo fmt"));
    assert_eq!(fetcher.requests().len(), 1);

    assert_eq!(run.state.status, PipelineStatus::Success);
    assert_eq!(run.state.total_instances, 1);
    assert_eq!(run.state.succeeded_instances, 1);
    assert_eq!(run.state.failed_instances, 0);
}

#[tokio::test]
async fn test_format_check_failure_is_reported() {
    let workflow = load(DEFAULT_WORKFLOW);
    let runner = MockRunner::new().fail("cargo fmt", ExitSignal::Code(1));

    let run = run_with(&workflow, runner, MockFetcher::new()).await;

    assert_eq!(run.result.status, PipelineStatus::Failure);
    let report = instance(&run.result, LABEL);
    assert_aborted(
        report,
        JobError::StepFailure {
            index: 4,
            step: "run-format-check".to_string(),
            exit: ExitSignal::Code(1),
        },
    );

    let failures = run.result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].combination, "os=ubuntu-latest");
    assert_eq!(failures[0].step, "run-format-check");
    assert_eq!(
        run.result.summary(),
        "CI: Failure (1 of 1 instance(s) failed)\n  \
         test (os=ubuntu-latest): StepFailure at step 4 'run-format-check' (exit code 1)"
    );
}

#[tokio::test]
async fn test_events_follow_execution_order() {
    let workflow = load(DEFAULT_WORKFLOW);

    let run = run_with(&workflow, MockRunner::new(), MockFetcher::new()).await;

    assert!(matches!(
        run.events.first(),
        Some(ExecutionEvent::PipelineStarted { instances: 1, .. })
    ));
    assert!(matches!(
        run.events.last(),
        Some(ExecutionEvent::PipelineFinished {
            status: PipelineStatus::Success,
            ..
        })
    ));

    let finished: Vec<usize> = run
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::StepFinished { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let workflow = load(DEFAULT_WORKFLOW);
    let runner = MockRunner::new().fail("cargo test", ExitSignal::Code(101));

    let run = run_with(&workflow, runner, MockFetcher::new()).await;

    let again = aggregate(
        run.result.run_id,
        &run.result.workflow,
        run.result.instances.clone(),
    );
    assert_eq!(again, run.result);
    assert_eq!(again.summary(), run.result.summary());
}

#[test]
fn test_default_workflow_triggers() {
    let workflow = load(DEFAULT_WORKFLOW);
    assert!(workflow.is_triggered_by(&Trigger::WorkflowDispatch));
    assert!(workflow.is_triggered_by(&Trigger::Push));
    assert!(!workflow.is_triggered_by(&Trigger::parse("pull_request")));
}

#[test]
fn test_missing_triggers_default_to_manual_dispatch() {
    let workflow = load(
        r#"
jobs:
  build:
    steps:
      - run: make
"#,
    );
    assert_eq!(workflow.name, "workflow");
    assert!(workflow.is_triggered_by(&Trigger::WorkflowDispatch));
    assert!(!workflow.is_triggered_by(&Trigger::Push));
}
