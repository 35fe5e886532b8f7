//! Shell subprocess runner - hands step scripts to bash or sh

use crate::core::{ExitSignal, Shell, StepContext};
use crate::runner::{CommandRunner, OutputCallback, OutputStream, RunnerConfig, RunnerError};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Runs step scripts as local shell subprocesses
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    config: RunnerConfig,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        script: &str,
        shell: Shell,
        ctx: &StepContext,
        output: Option<&dyn OutputCallback>,
    ) -> Result<ExitSignal, RunnerError> {
        let (program, args) = shell.command();
        debug!(
            "Spawning {} in {} ({} bytes of script)",
            program,
            ctx.working_dir.display(),
            script.len()
        );

        let mut child = Command::new(program)
            .args(args)
            .arg(script)
            .current_dir(&ctx.working_dir)
            .envs(&self.config.env)
            .envs(&ctx.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let label = ctx.label.as_str();

        let completion = async {
            let (status, _, _) = tokio::join!(
                child.wait(),
                forward_lines(stdout, OutputStream::Stdout, label, output),
                forward_lines(stderr, OutputStream::Stderr, label, output),
            );
            status
        };

        let status = match ctx.timeout_secs.or(self.config.default_timeout_secs) {
            Some(secs) => {
                let finished = timeout(Duration::from_secs(secs), completion).await;
                if let Ok(status) = finished {
                    status
                } else {
                    warn!("{}: command timed out after {}s, killing it", label, secs);
                    if let Err(e) = child.kill().await {
                        warn!("{}: failed to kill timed out command: {}", label, e);
                    }
                    return Ok(ExitSignal::TimedOut { secs });
                }
            }
            None => completion.await,
        };

        let status = status.map_err(|source| RunnerError::Wait {
            program: program.to_string(),
            source,
        })?;

        let exit = exit_signal(status);
        debug!("{}: {} finished with {}", label, program, exit);
        Ok(exit)
    }
}

async fn forward_lines<R>(
    reader: Option<R>,
    stream: OutputStream,
    label: &str,
    output: Option<&dyn OutputCallback>,
) where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match output {
            Some(callback) => callback.on_line(label, stream, &line),
            None => debug!("{} | {}", label, line),
        }
    }
}

fn exit_signal(status: ExitStatus) -> ExitSignal {
    if let Some(code) = status.code() {
        return ExitSignal::Code(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitSignal::Signal(signal);
        }
    }

    ExitSignal::Code(-1)
}
