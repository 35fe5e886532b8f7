//! Job executor - runs one job instance through provisioning, fetch and body

use crate::{
    core::{
        InstanceOutcome, InstanceReport, JobDefinition, JobError, JobInstance, Phase,
        ResolvedBody, Step, StepContext, StepResult, ExitSignal,
    },
    execution::{EventBus, ExecutionEvent},
    runner::{CheckoutRequest, CommandRunner, OutputCallback, SourceFetcher},
};
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How one step attempt ended
struct StepAttempt {
    exit: ExitSignal,
    /// Failure detail beyond the exit indicator, if any
    detail: Option<String>,
}

impl StepAttempt {
    fn exited(exit: ExitSignal) -> Self {
        Self { exit, detail: None }
    }
}

/// Everything an instance needs while it runs
struct InstanceRun<'a> {
    job: &'a JobDefinition,
    instance: &'a JobInstance,
    workspace: &'a Path,
    base: StepContext,
    events: &'a EventBus,
    output: Option<&'a dyn OutputCallback>,
    results: Vec<StepResult>,
}

/// Executes job instances with a command runner and a source fetcher
pub struct JobExecutor<R, F> {
    runner: R,
    fetcher: F,
}

impl<R: CommandRunner, F: SourceFetcher> JobExecutor<R, F> {
    pub fn new(runner: R, fetcher: F) -> Self {
        Self { runner, fetcher }
    }

    /// Run every step of one instance, stopping at the first failure
    ///
    /// Steps after a failure produce no result. Steps whose guard is false
    /// are recorded as skipped and execution continues.
    pub async fn execute(
        &self,
        job: &JobDefinition,
        instance: JobInstance,
        workspace: &Path,
        events: &EventBus,
        output: Option<&dyn OutputCallback>,
    ) -> InstanceReport {
        let started_at = Utc::now();
        let runs_on = job.runs_on_for(&instance);
        let label = instance.label();

        info!("Starting {} on {}", label, runs_on);
        events
            .emit(ExecutionEvent::InstanceStarted {
                label: label.clone(),
                runs_on: runs_on.clone(),
            })
            .await;

        let mut run = InstanceRun {
            job,
            instance: &instance,
            workspace,
            base: StepContext::for_instance(&instance, workspace, &job.env),
            events,
            output,
            results: Vec::new(),
        };

        let outcome = match self.run_phases(&mut run).await {
            Ok(()) => {
                info!("{} completed", label);
                InstanceOutcome::Completed
            }
            Err(error) => {
                warn!("{} aborted: {}", label, error);
                InstanceOutcome::Aborted(error)
            }
        };
        let steps = run.results;

        events
            .emit(ExecutionEvent::InstanceFinished {
                label,
                outcome: outcome.clone(),
            })
            .await;

        InstanceReport {
            instance,
            runs_on,
            steps,
            outcome,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn run_phases(&self, run: &mut InstanceRun<'_>) -> Result<(), JobError> {
        self.run_phase(run, Phase::Setup).await?;
        self.run_phase(run, Phase::Fetch).await?;
        self.run_phase(run, Phase::Run).await
    }

    async fn run_phase(&self, run: &mut InstanceRun<'_>, phase: Phase) -> Result<(), JobError> {
        let job = run.job;
        for step in job.steps_in_phase(phase) {
            let name = step.display_name(run.instance);
            let label = run.base.label.clone();

            if !step.should_run(run.instance) {
                debug!("{}: skipping step {} '{}' (guard is false)", label, step.index, name);
                run.results.push(StepResult::skipped(step.index, name.clone()));
                run.events
                    .emit(ExecutionEvent::StepSkipped {
                        label,
                        index: step.index,
                        step: name,
                    })
                    .await;
                continue;
            }

            info!("{}: step {} '{}'", label, step.index, name);
            run.events
                .emit(ExecutionEvent::StepStarted {
                    label: label.clone(),
                    index: step.index,
                    step: name.clone(),
                })
                .await;

            let started_at = Utc::now();
            let clock = Instant::now();
            let attempt = self.run_step(run, step).await;
            let duration = clock.elapsed();

            let result = StepResult::finished(step.index, name.clone(), attempt.exit.clone(), started_at, duration);
            run.events
                .emit(ExecutionEvent::StepFinished {
                    label,
                    index: step.index,
                    step: name.clone(),
                    status: result.status,
                    exit: attempt.exit.clone(),
                    duration,
                })
                .await;
            run.results.push(result);

            if !attempt.exit.is_success() {
                return Err(job_error(phase, step.index, name, attempt));
            }
        }
        Ok(())
    }

    async fn run_step(&self, run: &InstanceRun<'_>, step: &Step) -> StepAttempt {
        let ctx = run.base.with_step(
            step.render_env(run.instance),
            step.working_directory.as_deref(),
            step.timeout_secs.or(run.job.timeout_secs),
        );

        let body = match step.resolve(run.instance) {
            Ok(body) => body,
            Err(e) => {
                return StepAttempt {
                    exit: ExitSignal::SpawnError(e.to_string()),
                    detail: Some(e.to_string()),
                }
            }
        };

        match body {
            ResolvedBody::Script { script, shell } => {
                match self.runner.run(&script, shell, &ctx, run.output).await {
                    Ok(exit) => StepAttempt::exited(exit),
                    Err(e) => StepAttempt {
                        exit: e.to_exit_signal(),
                        detail: Some(e.to_string()),
                    },
                }
            }
            ResolvedBody::Checkout(action) => {
                let Some(request) = CheckoutRequest::from_action(&action, run.workspace) else {
                    return StepAttempt::exited(ExitSignal::SpawnError(format!(
                        "{:?} is not a checkout",
                        action
                    )));
                };
                match self.fetcher.fetch(&request, &ctx).await {
                    Ok(()) => StepAttempt::exited(ExitSignal::Code(0)),
                    Err(e) => StepAttempt {
                        exit: e.exit(),
                        detail: Some(e.to_string()),
                    },
                }
            }
        }
    }
}

fn job_error(phase: Phase, index: usize, step: String, attempt: StepAttempt) -> JobError {
    match phase {
        Phase::Setup => JobError::Provisioning {
            index,
            step,
            exit: attempt.exit,
        },
        Phase::Fetch => JobError::Fetch {
            index,
            step,
            message: attempt
                .detail
                .unwrap_or_else(|| attempt.exit.to_string()),
            exit: attempt.exit,
        },
        Phase::Run => JobError::StepFailure {
            index,
            step,
            exit: attempt.exit,
        },
    }
}
