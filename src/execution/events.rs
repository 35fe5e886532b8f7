//! Execution events and the handlers that observe them

use crate::core::{ExitSignal, InstanceOutcome, PipelineStatus, StepStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Events that can occur during a workflow run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        workflow: String,
        instances: usize,
    },
    InstanceStarted {
        label: String,
        runs_on: String,
    },
    StepStarted {
        label: String,
        index: usize,
        step: String,
    },
    /// The step's guard evaluated to false
    StepSkipped {
        label: String,
        index: usize,
        step: String,
    },
    StepFinished {
        label: String,
        index: usize,
        step: String,
        status: StepStatus,
        exit: ExitSignal,
        duration: Duration,
    },
    InstanceFinished {
        label: String,
        outcome: InstanceOutcome,
    },
    PipelineFinished {
        run_id: Uuid,
        status: PipelineStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Fan-out of events to every registered handler
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.write().await.push(Arc::new(handler));
    }

    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
