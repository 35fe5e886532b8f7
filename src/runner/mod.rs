//! External command interface: shells for step bodies, git for checkouts

pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod shell;

use crate::core::{ExitSignal, Shell, StepContext};
use async_trait::async_trait;
pub use config::RunnerConfig;
pub use error::{FetchError, RunnerError};
pub use fetch::{CheckoutRequest, GitFetcher, SourceFetcher};
pub use output::{OutputCallback, OutputStream};
pub use shell::ShellRunner;

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a script to completion and report how it terminated
    ///
    /// A non-zero exit, a signal or a timeout is an `Ok` exit signal; `Err`
    /// means the command could not be started or awaited at all.
    async fn run(
        &self,
        script: &str,
        shell: Shell,
        ctx: &StepContext,
        output: Option<&dyn OutputCallback>,
    ) -> Result<ExitSignal, RunnerError>;
}
