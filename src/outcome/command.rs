// src/outcome/command.rs

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::console::HostStatus;
use crate::host::Host;
use crate::outcome::{FailureReason, render_connection_summary, render_stream_summary};
use crate::transport::{ChannelEvent, ConnectionError};

/// Where a command outcome is in its lifecycle.
///
/// ```text
/// Idle ──command_started──▶ Started ──command_finished──▶ Finished
///   │
///   └──connection_failed──▶ ConnectionFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Idle,
    Started,
    Finished,
    ConnectionFailed,
}

/// Result of running one command on one host.
///
/// Built incrementally from transport events. Once finished (or once the
/// connection failed) every field is frozen: later mutations are logged and
/// ignored.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    host: Host,
    command: String,
    stdout: String,
    stderr: String,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    exit_status: Option<i32>,
    exit_signal: Option<String>,
    failure_reason: Option<FailureReason>,
    connection_error: Option<ConnectionError>,
    status: Option<HostStatus>,
}

impl CommandOutcome {
    pub fn new(host: Host, command: impl Into<String>) -> Self {
        Self {
            host,
            command: command.into(),
            stdout: String::new(),
            stderr: String::new(),
            started_at: None,
            finished_at: None,
            exit_status: None,
            exit_signal: None,
            failure_reason: None,
            connection_error: None,
            status: None,
        }
    }

    /// Drive `status` through the same transitions as this outcome.
    pub fn with_status(mut self, status: HostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn state(&self) -> CommandState {
        if self.connection_error.is_some() {
            CommandState::ConnectionFailed
        } else if self.finished_at.is_some() {
            CommandState::Finished
        } else if self.started_at.is_some() {
            CommandState::Started
        } else {
            CommandState::Idle
        }
    }

    pub fn command_started(&mut self) {
        if self.state() != CommandState::Idle {
            warn!(host = %self.host, command = %self.command, state = ?self.state(),
                "command_started called outside the idle state; ignoring");
            return;
        }
        self.started_at = Some(Instant::now());
        debug!(host = %self.host, command = %self.command, "command started");

        if let Some(status) = &self.status {
            status.running();
        }
    }

    pub fn append_stdout(&mut self, chunk: &str) {
        if self.is_frozen("stdout") {
            return;
        }
        self.stdout.push_str(chunk);
    }

    pub fn append_stderr(&mut self, chunk: &str) {
        if self.is_frozen("stderr") {
            return;
        }
        self.stderr.push_str(chunk);
    }

    /// Record the exit status. A non-zero status classifies the outcome as
    /// `NonzeroExitStatus` unless a signal was already recorded.
    pub fn set_exit_status(&mut self, status: i32) {
        if self.is_frozen("exit_status") {
            return;
        }
        if let Some(previous) = self.exit_status {
            warn!(host = %self.host, previous, status, "exit_status already set; ignoring");
            return;
        }
        self.exit_status = Some(status);
        if status != 0 && self.failure_reason.is_none() {
            self.failure_reason = Some(FailureReason::NonzeroExitStatus);
        }
    }

    /// Record the terminating signal. Always classifies the outcome as
    /// `ExitSignal`, even if an exit status arrived first.
    pub fn set_exit_signal(&mut self, signal: impl Into<String>) {
        if self.is_frozen("exit_signal") {
            return;
        }
        let signal = signal.into();
        if let Some(previous) = &self.exit_signal {
            warn!(host = %self.host, %previous, %signal, "exit_signal already set; ignoring");
            return;
        }
        self.exit_signal = Some(signal);
        self.failure_reason = Some(FailureReason::ExitSignal);
    }

    /// Apply one transport event.
    pub fn apply(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Stdout(chunk) => self.append_stdout(&chunk),
            ChannelEvent::Stderr(chunk) => self.append_stderr(&chunk),
            ChannelEvent::ExitStatus(code) => self.set_exit_status(code),
            ChannelEvent::ExitSignal(signal) => self.set_exit_signal(signal),
            ChannelEvent::Closed => {}
        }
    }

    /// Terminal transition from `Started`.
    pub fn command_finished(&mut self) {
        if self.state() != CommandState::Started {
            warn!(host = %self.host, command = %self.command, state = ?self.state(),
                "command_finished called outside the started state; ignoring");
            return;
        }
        self.finished_at = Some(Instant::now());
        debug!(
            host = %self.host,
            command = %self.command,
            exit_status = ?self.exit_status,
            exit_signal = ?self.exit_signal,
            "command finished"
        );

        if let Some(status) = &self.status {
            if self.is_successful() {
                status.done();
            } else {
                status.failed(self.failure_summary());
            }
        }
    }

    /// Terminal transition from `Idle`: the session could not be opened, so
    /// the command never started and `command_finished` will not follow.
    pub fn connection_failed(&mut self, error: ConnectionError) {
        if self.state() != CommandState::Idle {
            warn!(host = %self.host, state = ?self.state(),
                "connection_failed called outside the idle state; ignoring");
            return;
        }
        debug!(host = %self.host, code = error.code, reason = %error.reason, "connection failed");
        self.failure_reason = Some(FailureReason::ConnectionError);
        self.connection_error = Some(error);

        if let Some(status) = &self.status {
            status.failed(self.failure_summary());
        }
    }

    fn is_frozen(&self, field: &str) -> bool {
        match self.state() {
            CommandState::Finished | CommandState::ConnectionFailed => {
                warn!(host = %self.host, command = %self.command, field,
                    "outcome is already finished; ignoring update");
                true
            }
            CommandState::Idle | CommandState::Started => false,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    pub fn exit_signal(&self) -> Option<&str> {
        self.exit_signal.as_deref()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    pub fn connection_error(&self) -> Option<&ConnectionError> {
        self.connection_error.as_ref()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.finished_at?.duration_since(self.started_at?))
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Exited with status 0. A signal reported alongside still sets
    /// [`failure_reason`](Self::failure_reason) but does not change this.
    pub fn is_successful(&self) -> bool {
        self.exit_status == Some(0)
    }

    pub fn is_failed(&self) -> bool {
        !self.is_successful()
    }

    /// Human-readable explanation of a failure; `None` when successful.
    pub fn failure_summary(&self) -> Option<String> {
        if self.is_successful() {
            return None;
        }
        match &self.connection_error {
            Some(error) => Some(render_connection_summary(error.code, &error.reason)),
            None => Some(render_stream_summary(&self.stdout, &self.stderr)),
        }
    }
}
