//! Source fetcher - materializes the repository into an instance workspace

use crate::core::{action::Action, ExitSignal, StepContext};
use crate::runner::{FetchError, RunnerError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

/// A checkout to perform for one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Branch, tag or commit; None keeps the source's HEAD
    pub reference: Option<String>,

    /// History depth; 0 fetches everything
    pub fetch_depth: u32,

    /// Directory the snapshot is written to
    pub destination: PathBuf,
}

impl CheckoutRequest {
    /// Build a request from a resolved checkout action
    ///
    /// Returns None for actions that aren't checkouts.
    pub fn from_action(action: &Action, workspace: &Path) -> Option<Self> {
        match action {
            Action::Checkout {
                reference,
                fetch_depth,
                path,
            } => Some(Self {
                reference: reference.clone(),
                fetch_depth: fetch_depth.unwrap_or(1),
                destination: match path {
                    Some(path) => workspace.join(path),
                    None => workspace.to_path_buf(),
                },
            }),
            Action::RustToolchain { .. } => None,
        }
    }
}

/// Trait for source materialization - allows for different backends
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, request: &CheckoutRequest, ctx: &StepContext) -> Result<(), FetchError>;
}

/// Fetcher that materializes a git repository with the `git` CLI
///
/// The destination may already hold files left by setup steps, so the
/// repository is initialized in place and fetched into it rather than cloned.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    /// Repository path or URL
    source: String,
}

impl GitFetcher {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Remote URL for the source; local paths go through `file://` so that
    /// shallow fetches are honored
    async fn remote_url(&self) -> String {
        match tokio::fs::canonicalize(&self.source).await {
            Ok(path) => format!("file://{}", path.display()),
            Err(_) => self.source.clone(),
        }
    }

    /// `git` invocations that bring `request` into its destination
    ///
    /// `initialized` tells whether the destination already is a repository.
    fn commands(&self, request: &CheckoutRequest, remote: &str, initialized: bool) -> Vec<Vec<String>> {
        let args = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        let mut commands = Vec::new();

        if initialized {
            commands.push(args(&["remote", "set-url", "origin", remote]));
        } else {
            commands.push(args(&["init", "--quiet"]));
            commands.push(args(&["remote", "add", "origin", remote]));
        }

        if request.fetch_depth > 0 {
            let depth = request.fetch_depth.to_string();
            let target = request.reference.as_deref().unwrap_or("HEAD");
            commands.push(args(&["fetch", "--quiet", "--no-tags", "--depth", depth.as_str(), "origin", target]));
            commands.push(args(&["checkout", "--quiet", "--force", "FETCH_HEAD"]));
            return commands;
        }

        // Full history: every branch and tag, so any ref or commit can be checked out
        commands.push(args(&["fetch", "--quiet", "--tags", "origin", "+refs/heads/*:refs/remotes/origin/*"]));
        match &request.reference {
            Some(reference) => commands.push(args(&["checkout", "--quiet", "--force", reference.as_str()])),
            None => {
                commands.push(args(&["fetch", "--quiet", "origin", "HEAD"]));
                commands.push(args(&["checkout", "--quiet", "--force", "FETCH_HEAD"]));
            }
        }
        commands
    }

    async fn git(&self, args: &[String], cwd: &Path, timeout_secs: Option<u64>) -> Result<(), FetchError> {
        let command_line = format!("git {}", args.join(" "));
        debug!("Running {}", command_line);

        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        let output = match timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), command.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return Err(FetchError::Git {
                        command: command_line,
                        exit: ExitSignal::TimedOut { secs },
                        stderr: String::new(),
                    })
                }
            },
            None => command.output().await,
        }
        .map_err(|source| RunnerError::Spawn {
            program: "git".to_string(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        let exit = match output.status.code() {
            Some(code) => ExitSignal::Code(code),
            None => ExitSignal::Code(-1),
        };
        Err(FetchError::Git {
            command: command_line,
            exit,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, request: &CheckoutRequest, ctx: &StepContext) -> Result<(), FetchError> {
        info!(
            "{}: checking out {} ({}) into {}",
            ctx.label,
            self.source,
            request.reference.as_deref().unwrap_or("HEAD"),
            request.destination.display()
        );

        let destination = &request.destination;
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| FetchError::Io {
                path: destination.display().to_string(),
                source,
            })?;

        let initialized = tokio::fs::try_exists(destination.join(".git"))
            .await
            .unwrap_or(false);
        let remote = self.remote_url().await;

        for args in self.commands(request, &remote, initialized) {
            self.git(&args, destination, ctx.timeout_secs).await?;
        }
        Ok(())
    }
}
