// src/transport/local.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{HostrunError, Result};
use crate::host::Host;
use crate::transport::process::stream_command;
use crate::transport::{ConnectionError, Session, Transport};

/// Runs every host's commands on this machine, with `root` standing in for
/// the remote home directory.
///
/// Used for `transport = "local"` and throughout the test suite.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rooted at `$HOME`, falling back to the current directory.
    pub fn home() -> Self {
        let root = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Transport for LocalTransport {
    fn connect(&self, host: &Host) -> std::result::Result<Arc<dyn Session>, ConnectionError> {
        if !self.root.is_dir() {
            return Err(ConnectionError::new(format!(
                "local root {:?} is not a directory",
                self.root
            )));
        }
        debug!(host = %host, root = ?self.root, "local session");
        Ok(Arc::new(LocalSession {
            label: host.to_string(),
            root: self.root.clone(),
        }))
    }
}

struct LocalSession {
    label: String,
    root: PathBuf,
}

impl LocalSession {
    fn transport_error(&self, reason: String) -> HostrunError {
        HostrunError::Transport {
            host: self.label.clone(),
            reason,
        }
    }
}

impl Session for LocalSession {
    fn execute(
        &self,
        command: &str,
        on_event: &mut dyn FnMut(crate::transport::ChannelEvent),
    ) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(&self.root);
        stream_command(cmd, &self.label, on_event)
    }

    fn upload(&self, content: &[u8], remote_path: &str, mode: u32) -> Result<()> {
        let path = self.root.join(remote_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| self.transport_error(format!("creating {parent:?}: {e}")))?;
        }
        fs::write(&path, content)
            .map_err(|e| self.transport_error(format!("writing {path:?}: {e}")))?;
        set_mode(&path, mode).map_err(|e| self.transport_error(format!("chmod {path:?}: {e}")))?;
        Ok(())
    }

    fn download(&self, remote_path: &str) -> Result<Vec<u8>> {
        let path = self.root.join(remote_path);
        fs::read(&path).map_err(|e| self.transport_error(format!("reading {path:?}: {e}")))
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
