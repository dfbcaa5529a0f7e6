// src/logging.rs

//! Diagnostics for `hostrun`, via `tracing` + `tracing-subscriber`.
//!
//! Records go to stderr. Stdout belongs to the live console, which rewrites
//! earlier lines in place and cannot tolerate interleaved log records.
//!
//! The filter comes from, in order:
//! 1. `--log-level`, applied to every target;
//! 2. `HOSTRUN_LOG`, a full filter directive such as
//!    `warn,hostrun::transport=debug`;
//! 3. `warn`.

use anyhow::{Context, Result, anyhow};
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "HOSTRUN_LOG";

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

/// The subscriber filter for a CLI level and a raw `HOSTRUN_LOG` value.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::default().add_directive(LevelFilter::from_level(level.into()).into()));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value `{directives}`")),
        None => Ok(EnvFilter::default().add_directive(LevelFilter::WARN.into())),
    }
}
