// src/outcome/callback.rs

use std::any::Any;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::console::HostStatus;
use crate::host::Host;
use crate::outcome::Value;

/// Why a callback (or local block) failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The callback called [`CallbackOutcome::fail`].
    #[error("failed: {0}")]
    Failed(String),

    /// The callback returned an error.
    #[error("error: {0}")]
    Raised(String),

    /// The callback panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl CallbackError {
    pub fn is_explicit(&self) -> bool {
        matches!(self, CallbackError::Failed(_))
    }

    pub fn message(&self) -> &str {
        match self {
            CallbackError::Failed(m) | CallbackError::Raised(m) | CallbackError::Panicked(m) => m,
        }
    }
}

/// Result of one callback invocation (or one local-only block) for one host.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    host: Host,
    value: Option<Value>,
    resolved: bool,
    error: Option<CallbackError>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    status: Option<HostStatus>,
}

impl CallbackOutcome {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            value: None,
            resolved: false,
            error: None,
            started_at: None,
            finished_at: None,
            status: None,
        }
    }

    pub fn with_status(mut self, status: HostStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the outcome's value explicitly. Takes precedence over whatever the
    /// callback returns.
    pub fn resolve(&mut self, value: impl Into<Value>) {
        self.value = Some(value.into());
        self.resolved = true;
    }

    /// Mark the outcome as failed on purpose.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(CallbackError::Failed(message.into()));
    }

    pub(crate) fn start(&mut self) {
        self.started_at = Some(Instant::now());
        if let Some(status) = &self.status {
            status.running();
        }
    }

    /// Record how the callback body ended: its return value, a returned
    /// error, or a caught panic. An explicit `fail` made during the call is
    /// kept over a later error.
    pub(crate) fn finish(&mut self, ended: std::thread::Result<anyhow::Result<Value>>) {
        match ended {
            Ok(Ok(value)) => {
                if !self.resolved {
                    self.value = Some(value);
                }
            }
            Ok(Err(err)) => {
                if self.error.is_none() {
                    self.error = Some(CallbackError::Raised(format!("{err:#}")));
                }
            }
            Err(payload) => {
                if self.error.is_none() {
                    self.error = Some(CallbackError::Panicked(panic_message(payload.as_ref())));
                }
            }
        }
        self.finished_at = Some(Instant::now());
        debug!(host = %self.host, error = ?self.error, "callback finished");

        if let Some(status) = &self.status {
            if self.is_successful() {
                status.done();
            } else {
                status.failed(self.failure_summary());
            }
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&CallbackError> {
        self.error.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.finished_at?.duration_since(self.started_at?))
    }

    pub fn is_successful(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_failed(&self) -> bool {
        !self.is_successful()
    }

    pub fn failure_summary(&self) -> Option<String> {
        self.error.as_ref().map(|err| err.to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
