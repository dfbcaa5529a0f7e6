use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hostrun::errors::{HostrunError, Result};
use hostrun::host::Host;
use hostrun::transport::{ChannelEvent, ConnectionError, Session, Transport};

/// How a fake command ends.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Exit {
    Status(i32),
    Signal(String),
}

/// Scripted reply to one command.
#[derive(Debug, Clone)]
pub struct FakeResponse {
    stdout: Vec<String>,
    stderr: Vec<String>,
    exit: Exit,
    delay: Duration,
}

impl Default for FakeResponse {
    fn default() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit: Exit::Status(0),
            delay: Duration::ZERO,
        }
    }
}

impl FakeResponse {
    /// Exit 0 after printing `stdout`.
    pub fn ok(stdout: &str) -> Self {
        Self::default().stdout(stdout)
    }

    pub fn exit(status: i32) -> Self {
        Self::default().status(status)
    }

    /// Add a stdout chunk; several calls produce several chunks.
    pub fn stdout(mut self, chunk: &str) -> Self {
        self.stdout.push(chunk.to_string());
        self
    }

    pub fn stderr(mut self, chunk: &str) -> Self {
        self.stderr.push(chunk.to_string());
        self
    }

    pub fn status(mut self, status: i32) -> Self {
        self.exit = Exit::Status(status);
        self
    }

    pub fn signal(mut self, signal: &str) -> Self {
        self.exit = Exit::Signal(signal.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn events(&self) -> Vec<ChannelEvent> {
        let mut events: Vec<_> = self
            .stdout
            .iter()
            .cloned()
            .map(ChannelEvent::Stdout)
            .chain(self.stderr.iter().cloned().map(ChannelEvent::Stderr))
            .collect();
        events.push(match &self.exit {
            Exit::Status(code) => ChannelEvent::ExitStatus(*code),
            Exit::Signal(signal) => ChannelEvent::ExitSignal(signal.clone()),
        });
        events.push(ChannelEvent::Closed);
        events
    }
}

/// A file written through a fake session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub address: String,
    pub path: String,
    pub content: Vec<u8>,
    pub mode: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    refused: HashMap<String, String>,
    failing_uploads: HashMap<String, String>,
    responses: HashMap<(String, String), FakeResponse>,
    defaults: HashMap<String, FakeResponse>,
    connects: HashMap<String, usize>,
    executed: Vec<(String, String)>,
    uploads: Vec<Upload>,
}

/// Transport whose hosts (keyed by address) reply with scripted responses.
///
/// Unscripted commands exit 0 with no output. Everything executed, uploaded
/// and connected is recorded.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to exactly `command` on `address`.
    pub fn respond(&self, address: &str, command: &str, response: FakeResponse) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert((address.to_string(), command.to_string()), response);
        self
    }

    /// Reply to any unscripted command on `address`.
    pub fn respond_default(&self, address: &str, response: FakeResponse) -> &Self {
        self.state
            .lock()
            .unwrap()
            .defaults
            .insert(address.to_string(), response);
        self
    }

    /// Make connecting to `address` fail.
    pub fn refuse(&self, address: &str, reason: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .refused
            .insert(address.to_string(), reason.to_string());
        self
    }

    pub fn fail_uploads(&self, address: &str, reason: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(address.to_string(), reason.to_string());
        self
    }

    /// Commands executed on `address`, in order.
    pub fn commands(&self, address: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .executed
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Addresses in the order their commands started.
    pub fn execution_order(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .executed
            .iter()
            .map(|(a, _)| a.clone())
            .collect()
    }

    pub fn connect_count(&self, address: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .connects
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.lock().unwrap().uploads.clone()
    }
}

impl Transport for FakeTransport {
    fn connect(&self, host: &Host) -> std::result::Result<Arc<dyn Session>, ConnectionError> {
        let address = host.address().to_string();
        let mut state = self.state.lock().unwrap();
        *state.connects.entry(address.clone()).or_default() += 1;

        if let Some(reason) = state.refused.get(&address) {
            return Err(ConnectionError::new(reason.clone()));
        }
        Ok(Arc::new(FakeSession {
            address,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    address: String,
    state: Arc<Mutex<FakeState>>,
}

impl Session for FakeSession {
    fn execute(&self, command: &str, on_event: &mut dyn FnMut(ChannelEvent)) -> Result<()> {
        let response = {
            let mut state = self.state.lock().unwrap();
            state
                .executed
                .push((self.address.clone(), command.to_string()));
            state
                .responses
                .get(&(self.address.clone(), command.to_string()))
                .or_else(|| state.defaults.get(&self.address))
                .cloned()
                .unwrap_or_default()
        };

        if !response.delay.is_zero() {
            thread::sleep(response.delay);
        }
        for event in response.events() {
            on_event(event);
        }
        Ok(())
    }

    fn upload(&self, content: &[u8], remote_path: &str, mode: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.failing_uploads.get(&self.address) {
            return Err(HostrunError::Transport {
                host: self.address.clone(),
                reason: reason.clone(),
            });
        }
        state.uploads.push(Upload {
            address: self.address.clone(),
            path: remote_path.to_string(),
            content: content.to_vec(),
            mode,
        });
        Ok(())
    }

    fn download(&self, remote_path: &str) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .uploads
            .iter()
            .rev()
            .find(|u| u.address == self.address && u.path == remote_path)
            .map(|u| u.content.clone())
            .ok_or_else(|| HostrunError::Transport {
                host: self.address.clone(),
                reason: format!("no such file: {remote_path}"),
            })
    }
}
