//! Execution scheduler - decides how many instances run at once

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

/// Strategy for scheduling instance execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute instances in expansion order, one at a time
    #[default]
    Sequential,

    /// Execute all instances at once
    Parallel,

    /// Limited parallelism (max N concurrent instances)
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Tighten the strategy with a job's `max-parallel`
    pub fn capped(self, max_parallel: Option<usize>) -> Self {
        match (self, max_parallel) {
            (_, None) | (SchedulingStrategy::Sequential, _) => self,
            (_, Some(1)) => SchedulingStrategy::Sequential,
            (SchedulingStrategy::Parallel, Some(max)) => SchedulingStrategy::LimitedParallel(max),
            (SchedulingStrategy::LimitedParallel(n), Some(max)) => {
                SchedulingStrategy::LimitedParallel(n.min(max))
            }
        }
    }

    /// Number of instances allowed to run together
    pub fn concurrency(&self, total: usize) -> usize {
        match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => total.max(1),
            SchedulingStrategy::LimitedParallel(max) => (*max).clamp(1, total.max(1)),
        }
    }
}

/// Scheduler for running independent tasks under a strategy
#[derive(Debug, Clone, Copy)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Run one task per item and return the outputs in item order,
    /// regardless of completion order
    pub async fn run_all<T, O, F, Fut>(&self, items: Vec<T>, task: F) -> Result<Vec<O>, JoinError>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = O> + Send + 'static,
        O: Send + 'static,
    {
        let total = items.len();
        let concurrency = self.strategy.concurrency(total);
        debug!("Scheduling {} task(s), {} at a time", total, concurrency);

        if concurrency == 1 {
            let mut outputs = Vec::with_capacity(total);
            for item in items {
                outputs.push(task(item).await);
            }
            return Ok(outputs);
        }

        let permits = Arc::new(Semaphore::new(concurrency));
        let mut set = JoinSet::new();
        for (position, item) in items.into_iter().enumerate() {
            let permits = permits.clone();
            let work = task(item);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (position, work.await)
            });
        }

        let mut slots: Vec<Option<O>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (position, output) = joined?;
            slots[position] = Some(output);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
