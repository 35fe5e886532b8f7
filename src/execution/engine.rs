//! Main execution engine - orchestrates the entire workflow run

use crate::{
    core::{InstanceReport, JobDefinition, JobInstance, RunState, Workflow},
    execution::{
        aggregate, EventBus, ExecutionEvent, ExecutionScheduler, JobExecutor, PipelineResult,
        SchedulingStrategy,
    },
    runner::{CommandRunner, OutputCallback, SourceFetcher},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Main workflow execution engine
pub struct ExecutionEngine<R, F> {
    executor: Arc<JobExecutor<R, F>>,
    strategy: SchedulingStrategy,
    events: EventBus,
    output: Option<Arc<dyn OutputCallback>>,
}

impl<R, F> ExecutionEngine<R, F>
where
    R: CommandRunner + 'static,
    F: SourceFetcher + 'static,
{
    pub fn new(runner: R, fetcher: F, strategy: SchedulingStrategy) -> Self {
        Self {
            executor: Arc::new(JobExecutor::new(runner, fetcher)),
            strategy,
            events: EventBus::new(),
            output: None,
        }
    }

    /// Forward command output lines to a callback
    pub fn with_output(mut self, output: Arc<dyn OutputCallback>) -> Self {
        self.output = Some(output);
        self
    }

    /// Add an event handler
    pub async fn add_event_handler<H>(&self, handler: H)
    where
        H: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler).await;
    }

    /// Execute every job of the workflow and aggregate the results
    ///
    /// Each instance gets its own directory under `workspace_root`. Jobs run
    /// in declaration order; a job's instances are scheduled with the
    /// engine's strategy, tightened by the job's `max-parallel`.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        workspace_root: &Path,
        state: &mut RunState,
    ) -> Result<PipelineResult> {
        let total = workflow.expand()?.len();

        info!(
            "Starting workflow {} ({}): {} instance(s)",
            workflow.name, state.run_id, total
        );
        state.start(total);
        self.events
            .emit(ExecutionEvent::PipelineStarted {
                run_id: state.run_id,
                workflow: workflow.name.clone(),
                instances: total,
            })
            .await;

        let mut reports = Vec::with_capacity(total);
        for job in &workflow.jobs {
            let job_reports = self.execute_job(job, workspace_root).await?;
            for report in &job_reports {
                state.record(&report.outcome);
            }
            reports.extend(job_reports);
        }

        let result = aggregate(state.run_id, &workflow.name, reports);
        state.finish(result.status);

        info!("Workflow {} finished: {:?}", workflow.name, result.status);
        self.events
            .emit(ExecutionEvent::PipelineFinished {
                run_id: state.run_id,
                status: result.status,
            })
            .await;

        Ok(result)
    }

    /// Run all instances of one job
    async fn execute_job(&self, job: &JobDefinition, workspace_root: &Path) -> Result<Vec<InstanceReport>> {
        let mut items = Vec::new();
        for instance in job.expand()? {
            let workspace = prepare_workspace(workspace_root, &instance).await?;
            items.push((instance, workspace));
        }

        let scheduler = ExecutionScheduler::new(self.strategy.capped(job.max_parallel));
        debug!("Job {} scheduled as {:?}", job.id, scheduler.strategy());

        let job = Arc::new(job.clone());
        scheduler
            .run_all(items, |(instance, workspace)| {
                let executor = self.executor.clone();
                let job = job.clone();
                let events = self.events.clone();
                let output = self.output.clone();
                async move {
                    executor
                        .execute(&job, instance, &workspace, &events, output.as_deref())
                        .await
                }
            })
            .await
            .with_context(|| format!("Instance task for job '{}' did not finish", job.id))
    }
}

/// Create an empty working directory for one instance
async fn prepare_workspace(root: &Path, instance: &JobInstance) -> Result<PathBuf> {
    let dir = root.join(format!("{}-{}", instance.job, instance.ordinal));
    if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to clear workspace {}", dir.display()))?;
    }
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create workspace {}", dir.display()))?;
    Ok(dir)
}
