//! Error taxonomy for workflow loading and job execution

use crate::core::state::ExitSignal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed workflow or job definition, detected before anything runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to parse workflow: {0}")]
    Parse(String),

    #[error("workflow defines no jobs")]
    NoJobs,

    #[error("job '{job}': {message}")]
    InvalidJob { job: String, message: String },

    #[error("unsatisfiable matrix: axis '{axis}' has no values")]
    EmptyAxis { axis: String },

    #[error("unsatisfiable matrix: every combination is excluded")]
    AllCombinationsExcluded,

    #[error("matrix exclude references unknown axis '{axis}'")]
    UnknownExcludeAxis { axis: String },

    #[error("job '{job}' step {index} ('{step}'): {message}")]
    InvalidStep {
        job: String,
        index: usize,
        step: String,
        message: String,
    },

    #[error("invalid guard expression '{expression}': {message}")]
    InvalidGuard { expression: String, message: String },

    #[error("unsupported action '{0}'")]
    UnsupportedAction(String),

    #[error("action '{action}': {message}")]
    InvalidActionInput { action: String, message: String },
}

/// Why a job instance stopped before completing all of its steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum JobError {
    /// A setup step terminated unsuccessfully
    #[error("provisioning failed at step {index} '{step}' ({exit})")]
    Provisioning {
        index: usize,
        step: String,
        exit: ExitSignal,
    },

    /// The source checkout could not be materialized
    #[error("fetch failed at step {index} '{step}': {message}")]
    Fetch {
        index: usize,
        step: String,
        message: String,
        exit: ExitSignal,
    },

    /// A body step terminated unsuccessfully
    #[error("step {index} '{step}' failed ({exit})")]
    StepFailure {
        index: usize,
        step: String,
        exit: ExitSignal,
    },
}

impl JobError {
    /// Order index of the step the instance aborted at
    pub fn step_index(&self) -> usize {
        match self {
            JobError::Provisioning { index, .. }
            | JobError::Fetch { index, .. }
            | JobError::StepFailure { index, .. } => *index,
        }
    }

    /// Name of the step the instance aborted at
    pub fn step_name(&self) -> &str {
        match self {
            JobError::Provisioning { step, .. }
            | JobError::Fetch { step, .. }
            | JobError::StepFailure { step, .. } => step,
        }
    }

    /// Captured termination signal of the failing step
    pub fn exit(&self) -> &ExitSignal {
        match self {
            JobError::Provisioning { exit, .. }
            | JobError::Fetch { exit, .. }
            | JobError::StepFailure { exit, .. } => exit,
        }
    }

    /// Short category label used in summaries
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Provisioning { .. } => "ProvisioningError",
            JobError::Fetch { .. } => "FetchError",
            JobError::StepFailure { .. } => "StepFailure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_accessors() {
        let err = JobError::StepFailure {
            index: 4,
            step: "run-format-check".to_string(),
            exit: ExitSignal::Code(1),
        };

        assert_eq!(err.step_index(), 4);
        assert_eq!(err.step_name(), "run-format-check");
        assert_eq!(err.exit(), &ExitSignal::Code(1));
        assert_eq!(err.kind(), "StepFailure");
        assert_eq!(
            err.to_string(),
            "step 4 'run-format-check' failed (exit code 1)"
        );
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::EmptyAxis { axis: "os".to_string() };
        assert!(err.to_string().contains("unsatisfiable matrix"));
        assert!(err.to_string().contains("os"));
    }
}
