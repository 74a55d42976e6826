// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every flag except `--config`, `--log-level` and `--dry-run` overrides the
//! matching key of the config file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `actord`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "actord",
    version,
    about = "Run migration actors on request and track their results.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Without it, built-in defaults are used.
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. `127.0.0.1:8000`.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Seconds a synchronous request waits for its actor.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Log actor stderr and default to debug logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ACTORD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the configuration, print it, but don't serve.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
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
