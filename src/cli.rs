// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `devloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devloop",
    version,
    about = "Rebuild, restart and live-reload a web app while you edit it.",
    long_about = None
)]
pub struct CliArgs {
    /// Entry point to run (default, make, make:watch, watchify, bundle, less,
    /// less:watch, copy-assets, copy-assets:watch, server:start,
    /// server:restart, server:watch).
    #[arg(value_name = "ENTRY", default_value = "default")]
    pub entry: String,

    /// Path to the config file (TOML).
    ///
    /// If omitted, `Devloop.toml` in the current directory is used when it
    /// exists; otherwise the conventional layout is assumed.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve config and the entry plan, print them, but don't run anything.
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
