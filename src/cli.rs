// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `drmflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "drmflow",
    version,
    about = "Run a staged task DAG against a DRM backend with bounded retries.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Drmflow.toml")]
    pub workflow: String,

    /// Override `[execution].max_attempts` from the workflow file.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DRMFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print stages, tasks and edges, but don't submit anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
