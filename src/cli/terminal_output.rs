//! Terminal output callback for streaming command output
//!
//! Lines are prefixed with the instance label so output from instances
//! running in parallel stays attributable.

use crate::runner::{OutputCallback, OutputStream};
use console::style;
use std::io::{self, Write};
use std::sync::Mutex;

/// Callback that prints command output lines to the terminal
#[derive(Debug, Default)]
pub struct TerminalOutputCallback {
    /// Serializes writers so lines from parallel instances don't interleave mid-line
    lock: Mutex<()>,
}

impl TerminalOutputCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format one line for display
    pub fn format_line(label: &str, stream: OutputStream, line: &str) -> String {
        match stream {
            OutputStream::Stdout => format!("{} {}", style(format!("{} |", label)).dim(), line),
            OutputStream::Stderr => format!(
                "{} {}",
                style(format!("{} |", label)).dim(),
                style(line).yellow()
            ),
        }
    }
}

/// A horizontal rule as wide as the terminal, 80 columns if unknown
pub fn separator() -> String {
    let width = term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80);
    "─".repeat(width)
}

impl OutputCallback for TerminalOutputCallback {
    fn on_line(&self, label: &str, stream: OutputStream, line: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", Self::format_line(label, stream, line));
        let _ = stdout.flush();
    }
}
