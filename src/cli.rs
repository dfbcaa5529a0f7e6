// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `hostrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hostrun",
    version,
    about = "Run named commands across a set of hosts over SSH.",
    long_about = None
)]
pub struct CliArgs {
    /// Command to run (a `[command.<name>]` from the config), followed by
    /// its `then` chain.
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `Hostrun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Hostrun.toml")]
    pub config: String,

    /// Hosts to run on, replacing the configured host set.
    #[arg(short = 'H', long, value_name = "HOST", value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Only run on hosts matching every `name=value` filter.
    #[arg(short = 'f', long, value_name = "NAME=VALUE", value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Strategy for every command (`parallel`, `serial`).
    #[arg(long, value_name = "NAME")]
    pub order: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOSTRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the pipeline, but don't connect to any host.
    #[arg(long)]
    pub dry_run: bool,

    /// Print every host's output after each command.
    #[arg(long)]
    pub show_output: bool,
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
