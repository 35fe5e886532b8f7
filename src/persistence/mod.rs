//! Persistence layer for workflow run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{PipelineStatus, RunState};
use crate::execution::PipelineResult;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow_name: String,

    /// Event that triggered the run
    pub event: String,

    pub status: PipelineStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub total_instances: usize,

    pub succeeded_instances: usize,

    pub failed_instances: usize,

    /// One line per failing instance
    pub failures: Vec<String>,
}

impl RunSummary {
    /// Fraction of instances that passed (0.0 to 1.0)
    pub fn pass_rate(&self) -> f64 {
        if self.total_instances == 0 {
            return 0.0;
        }
        self.succeeded_instances as f64 / self.total_instances as f64
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run, replacing any earlier record with the same ID
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List runs of a workflow, newest first
    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>>;

    /// Most recent run of a workflow
    async fn latest_run(&self, workflow_name: &str) -> Result<Option<RunSummary>> {
        Ok(self.list_runs(workflow_name).await?.into_iter().next())
    }

    async fn delete_run(&self, run_id: Uuid) -> Result<()>;

    /// List all workflow names with recorded runs
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|r| r.workflow_name == workflow_name)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn delete_run(&self, run_id: Uuid) -> Result<()> {
        self.runs.write().await.remove(&run_id);
        Ok(())
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.workflow_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Create a summary from a finished run
pub fn create_summary(state: &RunState, result: &PipelineResult, event: &str) -> RunSummary {
    RunSummary {
        run_id: state.run_id,
        workflow_name: result.workflow.clone(),
        event: event.to_string(),
        status: result.status,
        started_at: state.started_at.unwrap_or_else(Utc::now),
        completed_at: state.completed_at,
        total_instances: result.instances.len(),
        succeeded_instances: result.succeeded(),
        failed_instances: result.failed(),
        failures: result.failures().iter().map(ToString::to_string).collect(),
    }
}
