// src/transport/mod.rs

//! Remote shell transport.
//!
//! The orchestrator talks to a [`Transport`] instead of a concrete SSH
//! library. This makes it easy to swap in a scripted fake in tests while
//! keeping the production implementations here:
//!
//! - [`ssh`] drives the system `ssh` binary, multiplexing one connection per
//!   host.
//! - [`local`] runs commands on this machine with `sh -c`.
//! - [`pool`] caches one session per host for the life of the process.

pub mod local;
pub mod pool;
mod process;
pub mod ssh;

use std::fmt;
use std::sync::Arc;

use crate::errors::Result;
use crate::host::Host;

pub(crate) use process::shell_quote;
pub use local::LocalTransport;
pub use pool::SessionPool;
pub use process::read_chunks;
pub use ssh::{SshOptions, SshTransport};

/// Code reported by the built-in transports for every failed connect; the
/// reason string carries the specifics.
pub const CONNECTION_ERROR_CODE: i32 = -1;

/// Session establishment failed before any command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    pub code: i32,
    pub reason: String,
}

impl ConnectionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            code: CONNECTION_ERROR_CODE,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection error {}: {}", self.code, self.reason)
    }
}

impl std::error::Error for ConnectionError {}

/// One event on a command channel.
///
/// Within one stream, chunks arrive in order. Nothing is promised about the
/// interleaving of stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Stdout(String),
    Stderr(String),
    ExitStatus(i32),
    /// Signal name without the `SIG` prefix, e.g. `KILL`.
    ExitSignal(String),
    Closed,
}

/// An authenticated shell connection to one host.
pub trait Session: Send + Sync {
    /// Run `command`, reporting every channel event to `on_event` in arrival
    /// order. Returns once the channel is closed.
    ///
    /// `Err` means the transport itself broke; the command's own failure is
    /// reported through events.
    fn execute(&self, command: &str, on_event: &mut dyn FnMut(ChannelEvent)) -> Result<()>;

    /// Write `content` to `remote_path` (relative to the remote home) and
    /// set its permission bits.
    fn upload(&self, content: &[u8], remote_path: &str, mode: u32) -> Result<()>;

    fn download(&self, remote_path: &str) -> Result<Vec<u8>>;
}

/// Opens sessions.
pub trait Transport: Send + Sync {
    fn connect(&self, host: &Host) -> std::result::Result<Arc<dyn Session>, ConnectionError>;
}
