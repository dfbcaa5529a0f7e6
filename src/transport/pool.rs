// src/transport/pool.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::host::Host;
use crate::transport::{ConnectionError, Session, Transport};

/// One lazily created session per host, reused for every later command to
/// that host.
///
/// Failed connects are not remembered: the next command to the same host
/// tries again (there is no retry inside a single command).
pub struct SessionPool {
    transport: Arc<dyn Transport>,
    sessions: Mutex<HashMap<String, Arc<dyn Session>>>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SessionPool")
            .field("hosts", &sessions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SessionPool {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Cached session for `host`, connecting on first use.
    ///
    /// The lock is not held while connecting, so hosts in a parallel stage
    /// connect concurrently. If two workers race on the same host, the first
    /// session stored wins.
    pub fn session(&self, host: &Host) -> Result<Arc<dyn Session>, ConnectionError> {
        if let Some(session) = self.lock().get(host.uri()) {
            return Ok(Arc::clone(session));
        }

        debug!(host = %host, "opening session");
        let session = self.transport.connect(host)?;
        info!(host = %host, "session established");

        let mut sessions = self.lock();
        let stored = sessions
            .entry(host.uri().to_string())
            .or_insert(session);
        Ok(Arc::clone(stored))
    }

    pub fn is_connected(&self, host: &Host) -> bool {
        self.lock().contains_key(host.uri())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
