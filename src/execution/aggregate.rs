//! Result aggregation over finished instances

use crate::core::{ExitSignal, InstanceOutcome, InstanceReport, PipelineStatus, StepStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Aggregate of all instance outcomes for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub workflow: String,
    pub status: PipelineStatus,

    /// Reports in expansion order
    pub instances: Vec<InstanceReport>,
}

/// One failing instance, as named in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub job: String,

    /// `axis=value, ...`; empty for jobs without a matrix
    pub combination: String,

    /// ProvisioningError, FetchError or StepFailure
    pub kind: String,

    pub step_index: usize,
    pub step: String,
    pub exit: ExitSignal,
}

impl fmt::Display for FailureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.combination.is_empty() {
            write!(f, "{}", self.job)?;
        } else {
            write!(f, "{} ({})", self.job, self.combination)?;
        }
        write!(
            f,
            ": {} at step {} '{}' ({})",
            self.kind, self.step_index, self.step, self.exit
        )
    }
}

/// Combine instance reports into a pipeline result
///
/// The run fails if any instance aborted or recorded a failing step.
/// Skipped steps never count as failures.
pub fn aggregate(run_id: Uuid, workflow: &str, instances: Vec<InstanceReport>) -> PipelineResult {
    let failed = instances.iter().any(|report| failure_of(report).is_some());

    PipelineResult {
        run_id,
        workflow: workflow.to_string(),
        status: if failed {
            PipelineStatus::Failure
        } else {
            PipelineStatus::Success
        },
        instances,
    }
}

/// Why an instance counts as failed, if it does
///
/// An aborted instance reports its error; a completed one still fails when
/// any recorded step failed.
fn failure_of(report: &InstanceReport) -> Option<FailureSummary> {
    let (kind, step_index, step, exit) = match &report.outcome {
        InstanceOutcome::Aborted(error) => (
            error.kind(),
            error.step_index(),
            error.step_name().to_string(),
            error.exit().clone(),
        ),
        InstanceOutcome::Completed => {
            let failed = report.steps.iter().find(|s| s.status == StepStatus::Failure)?;
            (
                "StepFailure",
                failed.index,
                failed.name.clone(),
                failed.exit.clone().unwrap_or(ExitSignal::Code(-1)),
            )
        }
    };

    Some(FailureSummary {
        job: report.instance.job.clone(),
        combination: report.instance.combination(),
        kind: kind.to_string(),
        step_index,
        step,
        exit,
    })
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Success
    }

    pub fn succeeded(&self) -> usize {
        self.instances.len() - self.failed()
    }

    pub fn failed(&self) -> usize {
        self.failures().len()
    }

    /// Failing instances in expansion order
    pub fn failures(&self) -> Vec<FailureSummary> {
        self.instances.iter().filter_map(failure_of).collect()
    }

    /// Human-readable summary naming every failing instance
    pub fn summary(&self) -> String {
        let total = self.instances.len();
        if self.is_success() {
            return format!(
                "{}: Success ({} of {} instance(s) passed)",
                self.workflow,
                self.succeeded(),
                total
            );
        }

        let mut lines = vec![format!(
            "{}: Failure ({} of {} instance(s) failed)",
            self.workflow,
            self.failed(),
            total
        )];
        lines.extend(self.failures().iter().map(|f| format!("  {}", f)));
        lines.join("\n")
    }
}
