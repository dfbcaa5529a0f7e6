// src/transport/ssh.rs

//! Transport over the system `ssh` client.
//!
//! Each host gets an OpenSSH control master (`ControlMaster=auto`) the first
//! time it is reached, so the connect probe and every later command reuse a
//! single authenticated connection. Authentication is whatever the user's
//! ssh configuration and agent provide; `BatchMode=yes` turns any prompt into
//! a connection error instead of a hang.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{HostrunError, Result};
use crate::host::Host;
use crate::transport::process::{shell_quote, stream_command};
use crate::transport::{ChannelEvent, ConnectionError, Session, Transport};

/// Exit status the `ssh` client uses for its own failures.
const SSH_CLIENT_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshOptions {
    pub connect_timeout: Duration,
    /// Directory for control sockets; `None` disables multiplexing.
    pub control_dir: Option<PathBuf>,
    pub control_persist: Duration,
    pub identity_file: Option<PathBuf>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            control_dir: Some(std::env::temp_dir().join("hostrun-ssh")),
            control_persist: Duration::from_secs(300),
            identity_file: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    options: SshOptions,
}

impl SshTransport {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

impl Transport for SshTransport {
    fn connect(&self, host: &Host) -> std::result::Result<Arc<dyn Session>, ConnectionError> {
        let control_path = self.options.control_dir.as_ref().and_then(|dir| {
            match std::fs::create_dir_all(dir) {
                Ok(()) => Some(dir.join(control_socket_name(host))),
                Err(err) => {
                    warn!(dir = ?dir, error = %err, "cannot create control dir; multiplexing disabled");
                    None
                }
            }
        });

        let session = SshSession {
            host: host.clone(),
            options: self.options.clone(),
            control_path,
        };

        // Probe: establishes the control master and surfaces DNS, refused
        // port and authentication failures before any real command runs.
        let output = session
            .ssh_command("true")
            .stdin(Stdio::null())
            .output()
            .map_err(|err| ConnectionError::new(format!("failed to launch ssh: {err}")))?;

        if output.status.success() {
            debug!(host = %host, "ssh probe succeeded");
            return Ok(Arc::new(session));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match (output.status.code(), stderr.trim()) {
            (_, msg) if !msg.is_empty() => msg.to_string(),
            (Some(SSH_CLIENT_FAILURE), _) => "ssh connection failed".to_string(),
            (Some(code), _) => format!("ssh probe exited with status {code}"),
            (None, _) => "ssh probe was terminated by a signal".to_string(),
        };
        Err(ConnectionError::new(reason))
    }
}

fn control_socket_name(host: &Host) -> String {
    let mut hasher = DefaultHasher::new();
    host.uri().hash(&mut hasher);
    format!("hostrun-{:x}", hasher.finish())
}

struct SshSession {
    host: Host,
    options: SshOptions,
    control_path: Option<PathBuf>,
}

impl SshSession {
    fn ssh_command(&self, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.options.connect_timeout.as_secs()
            ));

        if let Some(port) = self.host.port() {
            cmd.arg("-p").arg(port.to_string());
        }
        if let Some(identity) = &self.options.identity_file {
            cmd.arg("-i").arg(identity);
        }
        if let Some(path) = &self.control_path {
            cmd.arg("-o")
                .arg("ControlMaster=auto")
                .arg("-o")
                .arg(format!(
                    "ControlPersist={}s",
                    self.options.control_persist.as_secs()
                ))
                .arg("-o")
                .arg(format!("ControlPath={}", path.display()));
        }

        cmd.arg(self.host.destination()).arg(remote_command);
        cmd
    }

    fn transport_error(&self, reason: impl Into<String>) -> HostrunError {
        HostrunError::Transport {
            host: self.host.to_string(),
            reason: reason.into(),
        }
    }
}

impl Session for SshSession {
    fn execute(&self, command: &str, on_event: &mut dyn FnMut(ChannelEvent)) -> Result<()> {
        stream_command(self.ssh_command(command), self.host.uri(), on_event)
    }

    fn upload(&self, content: &[u8], remote_path: &str, mode: u32) -> Result<()> {
        let quoted = shell_quote(remote_path);
        let remote = format!("cat > {quoted} && chmod {mode:o} {quoted}");

        let mut child = self
            .ssh_command(&remote)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.transport_error(format!("failed to launch ssh: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(content) {
                drop(stdin);
                if let Err(kill) = child.kill() {
                    debug!(host = %self.host, error = %kill, "ssh upload process already gone");
                }
                let status = child.wait();
                warn!(host = %self.host, error = %err, ?status, "upload aborted");
                return Err(self.transport_error(format!("streaming upload: {err}")));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.transport_error(format!("waiting on upload: {e}")))?;
        if !output.status.success() {
            return Err(self.transport_error(format!(
                "upload to {remote_path} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn download(&self, remote_path: &str) -> Result<Vec<u8>> {
        let output = self
            .ssh_command(&format!("cat {}", shell_quote(remote_path)))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.transport_error(format!("failed to launch ssh: {e}")))?;

        if !output.status.success() {
            return Err(self.transport_error(format!(
                "download of {remote_path} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}
