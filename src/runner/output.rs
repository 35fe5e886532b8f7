//! Streaming support for command output
//!
//! Output lines carry no contract; they are only forwarded for display.

/// Which pipe a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Callback for output lines as they arrive from a running command
///
/// This trait is object-safe and can be used as `&dyn OutputCallback`.
pub trait OutputCallback: Send + Sync {
    /// Called once per line, without the trailing newline
    ///
    /// `label` identifies the job instance that produced the line.
    fn on_line(&self, label: &str, stream: OutputStream, line: &str);
}
