//! matrix-ci - run matrix CI workflows locally with fail-fast steps

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use crate::core::{
    ConfigError, InstanceOutcome, InstanceReport, JobDefinition, JobError, JobInstance, Matrix,
    MatrixAxis, PipelineStatus, RunState, Step, StepResult, StepStatus, Workflow,
};
pub use execution::{aggregate, ExecutionEngine, ExecutionEvent, PipelineResult, SchedulingStrategy};
pub use runner::{CommandRunner, GitFetcher, OutputCallback, ShellRunner, SourceFetcher};
