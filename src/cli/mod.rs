//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use clap::{Parser, Subcommand};
use commands::{
    HistoryCommand, InitCommand, ListCommand, MatrixCommand, RunCommand, ValidateCommand,
};
use std::ffi::OsString;

/// Matrix CI workflow runner
#[derive(Debug, Parser, Clone)]
#[command(name = "matrix-ci")]
#[command(version)]
#[command(about = "Run matrix CI workflows locally with fail-fast steps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Stream command output while steps run
    #[arg(short, long, global = true)]
    pub stream: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow
    Run(RunCommand),

    /// Validate a workflow file
    Validate(ValidateCommand),

    /// Show the matrix expansion of a workflow
    Matrix(MatrixCommand),

    /// Write a starter workflow
    Init(InitCommand),

    /// List workflows with recorded runs
    List(ListCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
