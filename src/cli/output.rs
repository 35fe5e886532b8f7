//! CLI output formatting

use crate::{
    core::{ExitSignal, InstanceOutcome, JobDefinition, JobInstance, PipelineStatus, StepStatus},
    execution::{ExecutionEvent, PipelineResult},
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar counting finished instances
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a pipeline status for display
pub fn format_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Pending => style("PENDING").dim().to_string(),
        PipelineStatus::Running => style("RUNNING").yellow().to_string(),
        PipelineStatus::Success => style("SUCCESS").green().to_string(),
        PipelineStatus::Failure => style("FAILURE").red().to_string(),
    }
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Success => style("ok").green().to_string(),
        StepStatus::Failure => style("failed").red().to_string(),
        StepStatus::Skipped => style("skipped").dim().to_string(),
    }
}

fn format_exit(exit: &ExitSignal) -> String {
    match exit {
        ExitSignal::Code(0) => String::new(),
        other => format!(" ({})", other),
    }
}

/// Format a duration as `1.2s` or `3m 4s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            run_id,
            workflow,
            instances,
        } => format!(
            "{} Starting workflow {} ({}) with {} instance(s)",
            ROCKET,
            style(workflow).bold(),
            style(&run_id.to_string()[..8]).dim(),
            style(instances).cyan()
        ),
        ExecutionEvent::InstanceStarted { label, runs_on } => format!(
            "{} {} on {}",
            SPINNER,
            style(label).cyan().bold(),
            style(runs_on).dim()
        ),
        ExecutionEvent::StepStarted { label, index, step } => format!(
            "  {} [{}] step {} {}",
            style("▶").dim(),
            style(label).dim(),
            index,
            style(step).cyan()
        ),
        ExecutionEvent::StepSkipped { label, index, step } => format!(
            "  {}[{}] step {} {} {}",
            SKIP,
            style(label).dim(),
            index,
            step,
            format_step_status(StepStatus::Skipped)
        ),
        ExecutionEvent::StepFinished {
            label,
            index,
            step,
            status,
            exit,
            duration,
        } => {
            let icon = if *status == StepStatus::Success { CHECK } else { CROSS };
            format!(
                "  {}[{}] step {} {} {}{} in {}",
                icon,
                style(label).dim(),
                index,
                step,
                format_step_status(*status),
                format_exit(exit),
                style(format_duration(*duration)).dim()
            )
        }
        ExecutionEvent::InstanceFinished { label, outcome } => match outcome {
            InstanceOutcome::Completed => format!("{} {}", CHECK, style(label).green()),
            InstanceOutcome::Aborted(error) => format!(
                "{} {}: {}",
                CROSS,
                style(label).red(),
                style(error).dim()
            ),
        },
        ExecutionEvent::PipelineFinished { run_id, status } => format!(
            "{} Run {} finished: {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format the final result block
pub fn format_result(result: &PipelineResult) -> String {
    let mut lines = Vec::new();
    for report in &result.instances {
        let icon = if report.outcome.is_success() { CHECK } else { CROSS };
        lines.push(format!("{}{}", icon, style(report.instance.label()).bold()));
        for step in &report.steps {
            lines.push(format!(
                "     {:>2}. {} {}{}",
                step.index,
                step.name,
                format_step_status(step.status),
                step.exit.as_ref().map(format_exit).unwrap_or_default()
            ));
        }
    }
    lines.push(String::new());

    let headline = if result.is_success() {
        style(result.summary()).green().to_string()
    } else {
        style(result.summary()).red().to_string()
    };
    lines.push(headline);
    lines.join("\n")
}

/// Format the instances of one job as a table
pub fn format_instances(job: &JobDefinition, instances: &[JobInstance]) -> String {
    let mut lines = vec![format!(
        "{} ({} instance(s))",
        style(&job.id).bold(),
        style(instances.len()).cyan()
    )];
    for instance in instances {
        let combination = instance.combination();
        lines.push(format!(
            "  {:>3}. {} on {}",
            instance.ordinal,
            if combination.is_empty() {
                style("(no matrix)".to_string()).dim()
            } else {
                style(combination)
            },
            style(job.runs_on_for(instance)).dim()
        ));
    }
    lines.join("\n")
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        PipelineStatus::Success => CHECK,
        PipelineStatus::Failure => CROSS,
        PipelineStatus::Running => SPINNER,
        PipelineStatus::Pending => INFO,
    };

    format!(
        "{} {} - {} - {} ({}/{} passed) - {} - {}",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.workflow_name).bold(),
        format_status(summary.status),
        summary.succeeded_instances,
        summary.total_instances,
        style(&summary.event).cyan(),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}
