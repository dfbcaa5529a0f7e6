// src/outcome/mod.rs

//! Per-host results.
//!
//! - [`command`] is the state machine for one remote command on one host.
//! - [`callback`] records one pipeline callback (or local block) run.
//!
//! [`Outcome`] is what stage results hold: the first stage of a pipeline
//! produces command outcomes (or a callback outcome for a local block), every
//! chained callback stage produces callback outcomes.

pub mod callback;
pub mod command;

use std::fmt;

pub use callback::{CallbackError, CallbackOutcome};
pub use command::{CommandOutcome, CommandState};
pub use serde_json::Value;

use crate::host::Host;

/// Why a command outcome failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    ConnectionError,
    NonzeroExitStatus,
    ExitSignal,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::ConnectionError => "connection_error",
            FailureReason::NonzeroExitStatus => "nonzero_exit_status",
            FailureReason::ExitSignal => "exit_signal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Command(CommandOutcome),
    Callback(CallbackOutcome),
}

impl Outcome {
    pub fn host(&self) -> &Host {
        match self {
            Outcome::Command(o) => o.host(),
            Outcome::Callback(o) => o.host(),
        }
    }

    pub fn is_successful(&self) -> bool {
        match self {
            Outcome::Command(o) => o.is_successful(),
            Outcome::Callback(o) => o.is_successful(),
        }
    }

    pub fn is_failed(&self) -> bool {
        !self.is_successful()
    }

    pub fn failure_summary(&self) -> Option<String> {
        match self {
            Outcome::Command(o) => o.failure_summary(),
            Outcome::Callback(o) => o.failure_summary(),
        }
    }

    /// The value handed to the next pipeline callback: a command's stdout,
    /// or a callback's resolved value (`Null` if it had none).
    pub fn value(&self) -> Value {
        match self {
            Outcome::Command(o) => Value::String(o.stdout().to_string()),
            Outcome::Callback(o) => o.value().cloned().unwrap_or(Value::Null),
        }
    }

    pub fn as_command(&self) -> Option<&CommandOutcome> {
        match self {
            Outcome::Command(o) => Some(o),
            Outcome::Callback(_) => None,
        }
    }

    pub fn as_callback(&self) -> Option<&CallbackOutcome> {
        match self {
            Outcome::Callback(o) => Some(o),
            Outcome::Command(_) => None,
        }
    }
}

impl From<CommandOutcome> for Outcome {
    fn from(outcome: CommandOutcome) -> Self {
        Outcome::Command(outcome)
    }
}

impl From<CallbackOutcome> for Outcome {
    fn from(outcome: CallbackOutcome) -> Self {
        Outcome::Callback(outcome)
    }
}

/// `STDOUT:`/`STDERR:` dump with each line indented; an empty stream shows
/// as `(empty)`.
pub fn render_stream_summary(stdout: &str, stderr: &str) -> String {
    format!(
        "STDOUT:\n{}\nSTDERR:\n{}",
        indent_block(stdout),
        indent_block(stderr)
    )
}

pub fn render_connection_summary(code: i32, reason: &str) -> String {
    format!("Code: {code}\nReason: {reason}")
}

fn indent_block(text: &str) -> String {
    let text = text.trim_end_matches('\n');
    if text.is_empty() {
        return "  (empty)".to_string();
    }
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
