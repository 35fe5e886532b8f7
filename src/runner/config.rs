//! Command runner configuration

use std::collections::BTreeMap;

/// Configuration for the shell runner
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Timeout applied to steps that don't set `timeout-minutes`
    ///
    /// None waits indefinitely.
    pub default_timeout_secs: Option<u64>,

    /// Extra variables exported to every command, below step and job env
    pub env: BTreeMap<String, String>,
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}
