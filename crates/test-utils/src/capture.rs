use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use hostrun::context::FailureHandler;
use hostrun::engine::ExecutionResult;

/// A cloneable in-memory writer; hand one clone to the console and read the
/// other.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }

    pub fn clear(&self) {
        self.bytes.lock().unwrap().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Failure handler that remembers, for each call, the addresses of the
/// failed hosts.
#[derive(Debug, Default)]
pub struct RecordingFailureHandler {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingFailureHandler {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl FailureHandler for RecordingFailureHandler {
    fn handle(&self, result: &ExecutionResult) {
        let failed = result
            .failed_outcomes()
            .iter()
            .map(|o| o.host().address().to_string())
            .collect();
        self.calls.lock().unwrap().push(failed);
    }
}
