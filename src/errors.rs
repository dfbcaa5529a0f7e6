// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Per-host failures (non-zero exits, signals, unreachable hosts, failing
//! callbacks) are never represented here: they are recorded on the host's
//! outcome. This enum covers everything that aborts a stage or a run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostrunError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid host `{input}`: {reason}")]
    InvalidHost { input: String, reason: String },

    #[error("Unknown execution strategy: {0}")]
    UnknownStrategy(String),

    #[error("Command not found: {0}")]
    UnknownCommand(String),

    #[error("Cycle detected in command chain: {0}")]
    CommandCycle(String),

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Variable `{0}` refers to itself")]
    VariableCycle(String),

    #[error("Transport error on {host}: {reason}")]
    Transport { host: String, reason: String },

    #[error("Installing script `{script}` on {host} failed: {reason}")]
    ScriptInstall {
        host: String,
        script: String,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HostrunError>;
