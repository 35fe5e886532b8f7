//! Execution state models

use crate::core::error::JobError;
use crate::core::matrix::JobInstance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Overall status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every job instance completed all of its steps
    Success,
    /// At least one job instance aborted
    Failure,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Pending => "Pending",
            PipelineStatus::Running => "Running",
            PipelineStatus::Success => "Success",
            PipelineStatus::Failure => "Failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(PipelineStatus::Pending),
            "Running" => Some(PipelineStatus::Running),
            "Success" => Some(PipelineStatus::Success),
            "Failure" => Some(PipelineStatus::Failure),
            _ => None,
        }
    }
}

/// Status of one executed (or guarded-out) step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Success,
    Failure,
    /// The step's guard evaluated to false
    Skipped,
}

/// Termination signal captured from a step's command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitSignal {
    /// Process exited with this code
    Code(i32),
    /// Process was terminated by a signal
    Signal(i32),
    /// Process exceeded its timeout and was killed
    TimedOut { secs: u64 },
    /// Command could not be started at all
    SpawnError(String),
}

impl ExitSignal {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitSignal::Code(0))
    }
}

impl fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitSignal::Code(code) => write!(f, "exit code {}", code),
            ExitSignal::Signal(signal) => write!(f, "terminated by signal {}", signal),
            ExitSignal::TimedOut { secs } => write!(f, "timed out after {}s", secs),
            ExitSignal::SpawnError(message) => write!(f, "failed to start: {}", message),
        }
    }
}

/// Outcome of a single step in a job instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based order index of the step in its job
    pub index: usize,

    /// Rendered step name
    pub name: String,

    pub status: StepStatus,

    /// Captured termination signal (None when skipped)
    pub exit: Option<ExitSignal>,

    pub started_at: DateTime<Utc>,

    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl StepResult {
    pub fn skipped(index: usize, name: String) -> Self {
        Self {
            index,
            name,
            status: StepStatus::Skipped,
            exit: None,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn finished(
        index: usize,
        name: String,
        exit: ExitSignal,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let status = if exit.is_success() {
            StepStatus::Success
        } else {
            StepStatus::Failure
        };
        Self {
            index,
            name,
            status,
            exit: Some(exit),
            started_at,
            duration,
        }
    }
}

/// How a job instance ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceOutcome {
    /// Every step ran (or was skipped) without failure
    Completed,
    /// Execution stopped at the first failing step
    Aborted(JobError),
}

impl InstanceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InstanceOutcome::Completed)
    }
}

/// Everything recorded for one job instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceReport {
    pub instance: JobInstance,

    /// Rendered `runs-on` label
    pub runs_on: String,

    /// Step results in execution order; steps after an abort are absent
    pub steps: Vec<StepResult>,

    pub outcome: InstanceOutcome,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl InstanceReport {
    /// Look up the recorded result for a step by name
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Bookkeeping for a pipeline run in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    pub status: PipelineStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    pub total_instances: usize,

    pub succeeded_instances: usize,

    pub failed_instances: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: PipelineStatus::Pending,
            started_at: None,
            completed_at: None,
            total_instances: 0,
            succeeded_instances: 0,
            failed_instances: 0,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_instances: usize) {
        self.status = PipelineStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_instances = total_instances;
    }

    /// Record one finished instance
    pub fn record(&mut self, outcome: &InstanceOutcome) {
        if outcome.is_success() {
            self.succeeded_instances += 1;
        } else {
            self.failed_instances += 1;
        }
    }

    /// Mark run as finished with the aggregated status
    pub fn finish(&mut self, status: PipelineStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
