//! Runner error types

use crate::core::ExitSignal;
use thiserror::Error;

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    /// Exit indicator recorded for a command that never produced one
    pub fn to_exit_signal(&self) -> ExitSignal {
        ExitSignal::SpawnError(self.to_string())
    }
}

/// Error types for source checkout
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to prepare checkout directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("`{command}` failed ({exit}): {stderr}")]
    Git {
        command: String,
        exit: ExitSignal,
        stderr: String,
    },
}

impl FetchError {
    /// Termination signal to record for the fetch step
    pub fn exit(&self) -> ExitSignal {
        match self {
            FetchError::Git { exit, .. } => exit.clone(),
            FetchError::Runner(e) => e.to_exit_signal(),
            FetchError::Io { .. } => ExitSignal::SpawnError(self.to_string()),
        }
    }
}
