// src/console/host_status.rs

use std::sync::{Arc, Mutex, PoisonError};

use crate::console::sgr::{Color, Effect, Sgr};
use crate::console::{Console, Content, EntryId};
use crate::host::Host;

/// Lifecycle of one host's unit of work as shown on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostState {
    Starting,
    Running,
    Done,
    /// Carries the rendered failure summary, if there is one.
    Failed(Option<String>),
}

impl HostState {
    fn label(&self) -> &'static str {
        match self {
            HostState::Starting => "STARTING",
            HostState::Running => "RUNNING",
            HostState::Done => "DONE",
            HostState::Failed(_) => "FAILED",
        }
    }

    fn rendition(&self) -> Sgr {
        match self {
            HostState::Starting => Sgr::new().text(Color::Yellow),
            HostState::Running => Sgr::new().text(Color::Cyan),
            HostState::Done => Sgr::new().text(Color::Green),
            HostState::Failed(_) => Sgr::new().text(Color::Red).effect(Effect::Bold),
        }
    }
}

struct StatusContent {
    name: String,
    width: usize,
    description: Option<String>,
    state: Mutex<HostState>,
}

impl Content for StatusContent {
    fn render(&self) -> String {
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut text = format!(
            "  {:<width$}  {}",
            self.name,
            state.rendition().paint(state.label()),
            width = self.width
        );
        if let Some(description) = &self.description {
            text.push_str("  ");
            text.push_str(&Sgr::new().effect(Effect::Dim).paint(description));
        }
        text.push('\n');

        if let HostState::Failed(Some(summary)) = &state {
            let body = Sgr::new().text(Color::Red);
            for line in summary.lines() {
                text.push_str("      ");
                text.push_str(&body.paint(line));
                text.push('\n');
            }
        }

        text
    }
}

/// A status line for one host, printed as soon as it is created and
/// redrawn in place on every transition.
#[derive(Clone)]
pub struct HostStatus {
    console: Arc<Console>,
    entry: EntryId,
    content: Arc<StatusContent>,
}

impl std::fmt::Debug for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostStatus")
            .field("host", &self.content.name)
            .field("entry", &self.entry)
            .field("state", &self.state())
            .finish()
    }
}

impl HostStatus {
    /// Print a STARTING line for `host`, padding the name to `width` so
    /// columns line up across hosts.
    pub fn new(console: Arc<Console>, host: &Host, width: usize) -> Self {
        Self::create(console, host, width, None)
    }

    /// Like [`new`](Self::new), with `description` (the command text or the
    /// local step's name) shown after the state label.
    pub fn describing(
        console: Arc<Console>,
        host: &Host,
        width: usize,
        description: impl Into<String>,
    ) -> Self {
        Self::create(console, host, width, Some(description.into()))
    }

    fn create(console: Arc<Console>, host: &Host, width: usize, description: Option<String>) -> Self {
        let content = Arc::new(StatusContent {
            name: host.address().to_string(),
            width,
            description,
            state: Mutex::new(HostState::Starting),
        });
        let entry = console.print(content.clone());

        Self {
            console,
            entry,
            content,
        }
    }

    pub fn entry(&self) -> EntryId {
        self.entry
    }

    pub fn state(&self) -> HostState {
        self.content
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn running(&self) {
        self.transition(HostState::Running);
    }

    pub fn done(&self) {
        self.transition(HostState::Done);
    }

    pub fn failed(&self, summary: Option<String>) {
        self.transition(HostState::Failed(summary));
    }

    fn transition(&self, next: HostState) {
        {
            let mut state = self
                .content
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *state = next;
        }
        self.console.reprint(self.entry);
    }
}
