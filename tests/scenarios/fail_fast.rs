//! Fail-fast behavior across the setup, fetch and run phases

use crate::helpers::*;
use matrix_ci::core::{ExitSignal, InstanceOutcome, JobError, PipelineStatus, StepStatus};

#[tokio::test]
async fn test_steps_after_failure_do_not_run() {
    let workflow = load(
        r#"
jobs:
  build:
    steps:
      - name: compile
        run: make all
      - name: unit
        run: make test
      - name: package
        run: make dist
"#,
    );
    let runner = MockRunner::new().fail("make test", ExitSignal::Code(2));

    let run = run_with(&workflow, runner.clone(), MockFetcher::new()).await;

    assert_eq!(run.result.status, PipelineStatus::Failure);
    let report = instance(&run.result, "build");
    assert_steps(
        report,
        &[("compile", StepStatus::Success), ("unit", StepStatus::Failure)],
    );
    assert!(report.step("package").is_none());
    assert_aborted(
        report,
        JobError::StepFailure {
            index: 2,
            step: "unit".to_string(),
            exit: ExitSignal::Code(2),
        },
    );

    assert_eq!(runner.scripts_for("build"), vec!["make all", "make test"]);
}

#[tokio::test]
async fn test_setup_failure_is_provisioning_error() {
    let workflow = load(
        r#"
jobs:
  test:
    steps:
      - name: install-tools
        run: apt-get install -y foo
      - uses: actions/checkout@v4
      - name: run-tests
        run: cargo test
"#,
    );
    let runner = MockRunner::new().fail("apt-get", ExitSignal::Code(100));
    let fetcher = MockFetcher::new();

    let run = run_with(&workflow, runner.clone(), fetcher.clone()).await;

    let report = instance(&run.result, "test");
    assert_aborted(
        report,
        JobError::Provisioning {
            index: 1,
            step: "install-tools".to_string(),
            exit: ExitSignal::Code(100),
        },
    );
    assert_eq!(report.steps.len(), 1);
    assert!(fetcher.requests().is_empty(), "checkout must not run after setup failed");
    assert_eq!(runner.invocations().len(), 1);
    assert_eq!(run.result.failures()[0].kind, "ProvisioningError");
}

#[tokio::test]
async fn test_checkout_failure_is_fetch_error() {
    let workflow = load(
        r#"
jobs:
  test:
    steps:
      - uses: actions/checkout@v4
      - name: run-tests
        run: cargo test
"#,
    );
    let runner = MockRunner::new();

    let run = run_with(&workflow, runner.clone(), MockFetcher::failing(128)).await;

    let report = instance(&run.result, "test");
    match &report.outcome {
        InstanceOutcome::Aborted(JobError::Fetch { index, exit, message, .. }) => {
            assert_eq!(*index, 1);
            assert_eq!(*exit, ExitSignal::Code(128));
            assert!(message.contains("repository not found"), "message: {}", message);
        }
        other => panic!("expected fetch error, got {:?}", other),
    }
    assert_steps(report, &[("Run actions/checkout@v4", StepStatus::Failure)]);
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn test_checkout_request_uses_action_inputs() {
    let workflow = load(
        r#"
jobs:
  test:
    steps:
      - uses: actions/checkout@v4
        with:
          ref: release
          fetch-depth: 0
          path: src
      - run: cargo test
        working-directory: src
"#,
    );
    let runner = MockRunner::new();
    let fetcher = MockFetcher::new();

    run_with(&workflow, runner.clone(), fetcher.clone()).await;

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 1);
    let (label, request) = &requests[0];
    assert_eq!(label, "test");
    assert_eq!(request.reference.as_deref(), Some("release"));
    assert_eq!(request.fetch_depth, 0);
    assert!(request.destination.ends_with("test-1/src"));

    let invocation = &runner.invocations()[0];
    assert!(invocation.working_dir.ends_with("test-1/src"));
}

#[tokio::test]
async fn test_timed_out_step_aborts_instance() {
    let workflow = load(
        r#"
jobs:
  slow:
    timeout-minutes: 5
    steps:
      - name: soak
        run: ./soak.sh
        timeout-minutes: 1
      - name: report
        run: ./report.sh
"#,
    );
    let runner = MockRunner::new().fail("soak", ExitSignal::TimedOut { secs: 60 });

    let run = run_with(&workflow, runner.clone(), MockFetcher::new()).await;

    let report = instance(&run.result, "slow");
    assert_steps(report, &[("soak", StepStatus::Failure)]);
    assert_eq!(report.steps[0].exit, Some(ExitSignal::TimedOut { secs: 60 }));
    assert_eq!(runner.invocations()[0].timeout_secs, Some(60));
    assert!(run
        .result
        .summary()
        .contains("slow: StepFailure at step 1 'soak' (timed out after 60s)"));
}

#[tokio::test]
async fn test_job_timeout_applies_to_every_step() {
    let workflow = load(
        r#"
jobs:
  build:
    timeout-minutes: 2
    steps:
      - run: make
      - run: make check
"#,
    );
    let runner = MockRunner::new();

    run_with(&workflow, runner.clone(), MockFetcher::new()).await;

    let timeouts: Vec<Option<u64>> = runner.invocations().iter().map(|i| i.timeout_secs).collect();
    assert_eq!(timeouts, vec![Some(120), Some(120)]);
}

#[tokio::test]
async fn test_failing_job_does_not_stop_later_jobs() {
    let workflow = load(
        r#"
jobs:
  lint:
    steps:
      - run: cargo clippy
  test:
    steps:
      - run: cargo test
"#,
    );
    let runner = MockRunner::new().fail("clippy", ExitSignal::Code(1));

    let run = run_with(&workflow, runner.clone(), MockFetcher::new()).await;

    assert_eq!(run.result.status, PipelineStatus::Failure);
    assert_eq!(run.result.succeeded(), 1);
    assert_eq!(run.result.failed(), 1);
    assert!(instance(&run.result, "test").outcome.is_success());
    assert_eq!(run.state.failed_instances, 1);
    assert_eq!(run.state.succeeded_instances, 1);
}
