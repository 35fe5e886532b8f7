//! Workflow execution: scheduling, per-instance step execution, aggregation

pub mod aggregate;
pub mod engine;
pub mod events;
pub mod executor;
pub mod scheduler;

pub use aggregate::{aggregate, FailureSummary, PipelineResult};
pub use engine::ExecutionEngine;
pub use events::{EventBus, EventHandler, ExecutionEvent};
pub use executor::JobExecutor;
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
