//! CLI command definitions

use crate::core::MAX_TIMEOUT_MINUTES;
use crate::execution::SchedulingStrategy;
use clap::Args;
use std::path::PathBuf;

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Event that triggers the run
    #[arg(long, default_value = "workflow_dispatch")]
    pub event: String,

    /// Only run this job
    #[arg(long)]
    pub job: Option<String>,

    /// Scheduling strategy for matrix instances
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Sequential)]
    pub strategy: SchedulingStrategyArg,

    /// Concurrency limit for parallel-limited scheduling
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Default step timeout in minutes for steps without `timeout-minutes`
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_MINUTES))]
    pub timeout_minutes: Option<u64>,

    /// Root directory for instance workspaces (defaults to a temporary directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Repository checked out by `actions/checkout` (defaults to the current directory)
    #[arg(long)]
    pub source: Option<String>,

    /// Keep instance workspaces after the run
    #[arg(long)]
    pub keep_workspace: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the job instances a workflow expands to
#[derive(Debug, Args, Clone)]
pub struct MatrixCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Write a starter workflow file
#[derive(Debug, Args, Clone)]
pub struct InitCommand {
    /// Output path
    #[arg(short, long, default_value = "ci.yml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// List workflows with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    pub fn to_strategy(self, max_parallel: usize) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(max_parallel.max(1)),
        }
    }
}
