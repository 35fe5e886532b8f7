use anyhow::{bail, Context, Result};
use matrix_ci::cli::commands::{
    HistoryCommand, InitCommand, ListCommand, MatrixCommand, RunCommand, ValidateCommand,
};
use matrix_ci::cli::output::*;
use matrix_ci::cli::terminal_output::{separator, TerminalOutputCallback};
use matrix_ci::cli::{Cli, Command};
use matrix_ci::core::config::{WorkflowConfig, DEFAULT_WORKFLOW};
use matrix_ci::core::{PipelineStatus, RunState, Trigger, Workflow};
use matrix_ci::execution::{ExecutionEngine, ExecutionEvent};
use matrix_ci::persistence::{create_summary, PersistenceBackend, RunSummary};
use matrix_ci::runner::{GitFetcher, RunnerConfig, ShellRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides the -v default
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    let success = match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.stream).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Matrix(cmd) => show_matrix(cmd)?,
        Command::Init(cmd) => init_workflow(cmd)?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Load a workflow, printing the configuration error if it is invalid
fn load_workflow(path: &Path) -> Result<Option<Workflow>> {
    let loaded = WorkflowConfig::from_file(path).and_then(|config| Ok(config.to_workflow()?));
    match loaded {
        Ok(workflow) => Ok(Some(workflow)),
        Err(e) => {
            println!("{} Invalid workflow {}:", CROSS, style(path.display()).bold());
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(None)
        }
    }
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Box<dyn PersistenceBackend>> {
    Ok(Box::new(matrix_ci::persistence::SqliteRunStore::with_default_path().await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Box<dyn PersistenceBackend>> {
    warn!("Built without the sqlite feature; history is not kept between runs");
    Ok(Box::new(matrix_ci::persistence::InMemoryPersistence::new()))
}

async fn run_workflow(cmd: &RunCommand, stream: bool) -> Result<bool> {
    let Some(mut workflow) = load_workflow(&cmd.file)? else {
        return Ok(false);
    };

    let event = Trigger::parse(&cmd.event);
    if !workflow.is_triggered_by(&event) {
        println!(
            "{} Workflow {} is not triggered by {}; nothing to run",
            INFO,
            style(&workflow.name).bold(),
            style(&event).cyan()
        );
        return Ok(true);
    }

    if let Some(job) = &cmd.job {
        if workflow.job(job).is_none() {
            bail!("Workflow {} has no job '{}'", workflow.name, job);
        }
        workflow.jobs.retain(|j| &j.id == job);
    }

    let mut state = RunState::new();
    let workspace_root = cmd
        .workspace
        .clone()
        .unwrap_or_else(default_workspace_root)
        .join(state.run_id.to_string());

    let source = match &cmd.source {
        Some(source) => source.clone(),
        None => std::env::current_dir()
            .context("Failed to resolve current directory")?
            .display()
            .to_string(),
    };

    let mut runner_config = RunnerConfig::new();
    if let Some(minutes) = cmd.timeout_minutes {
        runner_config = runner_config.with_timeout(minutes * 60);
    }

    let mut engine = ExecutionEngine::new(
        ShellRunner::new(runner_config),
        GitFetcher::new(source),
        cmd.strategy.to_strategy(cmd.max_parallel),
    );
    if stream {
        engine = engine.with_output(Arc::new(TerminalOutputCallback::new()));
    }

    if !cmd.json {
        let total = workflow.expand()?.len();
        let progress = (!stream).then(|| create_progress_bar(total));
        engine
            .add_event_handler(move |event| {
                let line = format_execution_event(event);
                match &progress {
                    Some(bar) => {
                        bar.println(line);
                        match event {
                            ExecutionEvent::InstanceFinished { .. } => bar.inc(1),
                            ExecutionEvent::PipelineFinished { .. } => bar.finish_and_clear(),
                            _ => {}
                        }
                    }
                    None => println!("{}", line),
                }
            })
            .await;
    }

    let result = engine.execute(&workflow, &workspace_root, &mut state).await;
    cleanup_workspace(&workspace_root, cmd.keep_workspace).await;
    let result = result?;

    if !cmd.no_history {
        let store = open_store().await?;
        let summary = create_summary(&state, &result, event.as_str());
        store.save_run(&summary).await?;
        debug!("Run {} saved to history", summary.run_id);
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", separator());
        println!("{}", format_result(&result));
    }

    Ok(result.is_success())
}

async fn cleanup_workspace(root: &Path, keep: bool) {
    if keep {
        println!("{} Workspaces kept at {}", INFO, style(root.display()).dim());
        return;
    }
    if let Err(e) = tokio::fs::remove_dir_all(root).await {
        warn!("Failed to remove workspace {}: {}", root.display(), e);
    }
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating workflow...", INFO);

    let config = match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            return Ok(false);
        }
    };
    let workflow = config.to_workflow()?;

    println!("{} Workflow configuration is valid!", CHECK);
    println!("  Name: {}", style(&workflow.name).bold());
    println!(
        "  Triggers: {}",
        style(
            workflow
                .triggers
                .iter()
                .map(Trigger::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )
        .cyan()
    );
    println!("  Jobs: {}", style(workflow.jobs.len()).cyan());
    println!("  Instances: {}", style(workflow.expand()?.len()).cyan());
    println!("  Steps: {}", style(config.step_count()).cyan());

    if cmd.json {
        println!("\n{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(true)
}

fn show_matrix(cmd: &MatrixCommand) -> Result<bool> {
    let Some(workflow) = load_workflow(&cmd.file)? else {
        return Ok(false);
    };

    if cmd.json {
        let mut instances = Vec::new();
        for (job, instance) in workflow.expand()? {
            let values: serde_json::Map<String, serde_json::Value> = instance
                .values
                .iter()
                .map(|(axis, value)| (axis.clone(), serde_json::Value::String(value.clone())))
                .collect();
            instances.push(serde_json::json!({
                "job": job.id,
                "ordinal": instance.ordinal,
                "label": instance.label(),
                "runs_on": job.runs_on_for(&instance),
                "matrix": values,
            }));
        }
        let data = serde_json::json!({ "workflow": workflow.name, "instances": instances });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    for job in &workflow.jobs {
        println!("{}", format_instances(job, &job.expand()?));
    }
    Ok(true)
}

fn init_workflow(cmd: &InitCommand) -> Result<bool> {
    if cmd.output.exists() && !cmd.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            cmd.output.display()
        );
    }
    if let Some(parent) = cmd.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&cmd.output, DEFAULT_WORKFLOW)
        .with_context(|| format!("Failed to write {}", cmd.output.display()))?;

    println!("{} Wrote {}", CHECK, style(cmd.output.display()).bold());
    println!(
        "  Run it with: {}",
        style(format!("matrix-ci run -f {}", cmd.output.display())).cyan()
    );
    Ok(true)
}

async fn list_workflows(cmd: &ListCommand) -> Result<bool> {
    let store = open_store().await?;
    let workflows = store.list_workflows().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for workflow in &workflows {
            let runs = store.list_runs(workflow).await?;
            json_data.push(serde_json::json!({
                "name": workflow,
                "run_count": runs.len(),
                "succeeded": runs.iter().filter(|r| r.status == PipelineStatus::Success).count(),
                "failed": runs.iter().filter(|r| r.status == PipelineStatus::Failure).count(),
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(true);
    }

    println!("{} Workflows in history:", INFO);
    for workflow in &workflows {
        if cmd.with_counts {
            let runs = store.list_runs(workflow).await?;
            let succeeded = runs.iter().filter(|r| r.status == PipelineStatus::Success).count();
            let failed = runs.iter().filter(|r| r.status == PipelineStatus::Failure).count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(workflow).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(workflow).bold());
        }
    }
    Ok(true)
}

async fn show_history(cmd: &HistoryCommand) -> Result<bool> {
    let store = open_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary),
            None => println!("{} Run not found", WARN),
        }
        return Ok(true);
    }

    let mut runs: Vec<RunSummary> = match &cmd.workflow {
        Some(workflow) => store.list_runs(workflow).await?,
        None => {
            let mut all = Vec::new();
            for workflow in store.list_workflows().await? {
                all.extend(store.list_runs(&workflow).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(true);
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }
    Ok(true)
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    println!("  Event: {}", style(&summary.event).cyan());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Instances: {}/{} passed ({})",
        summary.succeeded_instances,
        summary.total_instances,
        style(format!("{:.0}%", summary.pass_rate() * 100.0)).cyan()
    );
    for failure in &summary.failures {
        println!("  {} {}", CROSS, style(failure).red());
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("matrix-ci")
}
