//! Test utilities for matrix-ci: scripted runner, fake fetcher, assertions

#![allow(dead_code)]

use async_trait::async_trait;
use matrix_ci::core::config::WorkflowConfig;
use matrix_ci::core::{
    ExitSignal, InstanceOutcome, InstanceReport, JobError, PipelineStatus, RunState, Shell,
    StepContext, StepStatus, Workflow,
};
use matrix_ci::execution::{ExecutionEngine, ExecutionEvent, PipelineResult, SchedulingStrategy};
use matrix_ci::runner::{
    CheckoutRequest, CommandRunner, FetchError, OutputCallback, OutputStream, RunnerError,
    SourceFetcher,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One command the mock runner was asked to run
#[derive(Debug, Clone)]
pub struct Invocation {
    pub label: String,
    pub script: String,
    pub shell: Shell,
    pub env: BTreeMap<String, String>,
    pub working_dir: PathBuf,
    pub timeout_secs: Option<u64>,
}

type Rule = (String, Option<String>, ExitSignal);

/// Mock runner that answers with scripted exit signals
///
/// A rule matches when the script contains its marker and, if given, the
/// instance label contains its label filter. Unmatched scripts exit 0.
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Arc<Vec<Rule>>,
    delays: Arc<Vec<(String, Duration)>>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts containing `marker` terminate with `exit`
    pub fn fail(mut self, marker: &str, exit: ExitSignal) -> Self {
        Arc::make_mut(&mut self.rules).push((marker.to_string(), None, exit));
        self
    }

    /// Like `fail`, but only for instances whose label contains `label`
    pub fn fail_on(mut self, label: &str, marker: &str, exit: ExitSignal) -> Self {
        Arc::make_mut(&mut self.rules).push((marker.to_string(), Some(label.to_string()), exit));
        self
    }

    /// Commands of instances whose label contains `label` take `delay`
    pub fn delay_on(mut self, label: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).push((label.to_string(), delay));
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Scripts run for one instance, in order
    pub fn scripts_for(&self, label: &str) -> Vec<String> {
        self.invocations()
            .into_iter()
            .filter(|i| i.label == label)
            .map(|i| i.script)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        script: &str,
        shell: Shell,
        ctx: &StepContext,
        output: Option<&dyn OutputCallback>,
    ) -> Result<ExitSignal, RunnerError> {
        self.invocations.lock().unwrap().push(Invocation {
            label: ctx.label.clone(),
            script: script.to_string(),
            shell,
            env: ctx.env.clone(),
            working_dir: ctx.working_dir.clone(),
            timeout_secs: ctx.timeout_secs,
        });

        let delay = self
            .delays
            .iter()
            .find(|(label, _)| ctx.label.contains(label.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(cb) = output {
            for line in script.lines() {
                cb.on_line(&ctx.label, OutputStream::Stdout, line);
            }
        }

        let exit = self
            .rules
            .iter()
            .find(|(marker, label, _)| {
                script.contains(marker.as_str())
                    && label.as_deref().map_or(true, |l| ctx.label.contains(l))
            })
            .map(|(_, _, exit)| exit.clone())
            .unwrap_or(ExitSignal::Code(0));
        Ok(exit)
    }
}

/// Fetcher that records checkouts and optionally fails them
#[derive(Clone, Default)]
pub struct MockFetcher {
    fail_with: Option<i32>,
    requests: Arc<Mutex<Vec<(String, CheckoutRequest)>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every checkout fails as if `git` exited with `code`
    pub fn failing(code: i32) -> Self {
        Self {
            fail_with: Some(code),
            ..Self::default()
        }
    }

    /// Checkouts requested so far, with the requesting instance's label
    pub fn requests(&self) -> Vec<(String, CheckoutRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(&self, request: &CheckoutRequest, ctx: &StepContext) -> Result<(), FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((ctx.label.clone(), request.clone()));

        match self.fail_with {
            None => Ok(()),
            Some(code) => Err(FetchError::Git {
                command: "git clone".to_string(),
                exit: ExitSignal::Code(code),
                stderr: "fatal: repository not found".to_string(),
            }),
        }
    }
}

/// Parse and validate a workflow
pub fn load(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .expect("workflow should parse")
        .to_workflow()
        .expect("workflow should be valid")
}

/// Test result from running a workflow
pub struct WorkflowTestResult {
    pub result: PipelineResult,
    pub state: RunState,
    pub events: Vec<ExecutionEvent>,
}

/// Run a workflow sequentially with the given mocks
pub async fn run_with(
    workflow: &Workflow,
    runner: MockRunner,
    fetcher: MockFetcher,
) -> WorkflowTestResult {
    run_with_strategy(workflow, runner, fetcher, SchedulingStrategy::Sequential).await
}

/// Run a workflow with the given mocks and scheduling strategy
pub async fn run_with_strategy(
    workflow: &Workflow,
    runner: MockRunner,
    fetcher: MockFetcher,
    strategy: SchedulingStrategy,
) -> WorkflowTestResult {
    let root = tempfile::tempdir().unwrap();
    let engine = ExecutionEngine::new(runner, fetcher, strategy);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event.clone()))
        .await;

    let mut state = RunState::new();
    let result = engine
        .execute(workflow, root.path(), &mut state)
        .await
        .expect("execution should not error");

    let events = events.lock().unwrap().clone();
    WorkflowTestResult {
        result,
        state,
        events,
    }
}

/// Find an instance report by label
pub fn instance<'a>(result: &'a PipelineResult, label: &str) -> &'a InstanceReport {
    result
        .instances
        .iter()
        .find(|r| r.instance.label() == label)
        .unwrap_or_else(|| panic!("no instance labelled '{}'", label))
}

/// Assert the recorded steps of an instance, in order
pub fn assert_steps(report: &InstanceReport, expected: &[(&str, StepStatus)]) {
    let actual: Vec<(&str, StepStatus)> = report
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.status))
        .collect();
    assert_eq!(actual, expected, "steps of {}", report.instance.label());
}

/// Assert that the whole run succeeded
pub fn assert_success(result: &PipelineResult) {
    assert_eq!(
        result.status,
        PipelineStatus::Success,
        "expected success, got:\n{}",
        result.summary()
    );
    assert!(result.failures().is_empty());
}

/// Assert the instance aborted with the given error
pub fn assert_aborted(report: &InstanceReport, expected: JobError) {
    assert_eq!(report.outcome, InstanceOutcome::Aborted(expected));
}
