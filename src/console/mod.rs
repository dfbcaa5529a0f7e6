// src/console/mod.rs

//! Live terminal output.
//!
//! The console owns the output stream and remembers every block it printed
//! (the *history*), together with the screen position the block started at.
//! Any earlier block can later be redrawn in place with [`Console::reprint`]:
//! the cursor walks back up to the block, the block is re-emitted, and every
//! block printed after it is re-emitted at its shifted position. This is how
//! host status lines change from RUNNING to DONE while other hosts keep
//! appending output below them.
//!
//! - [`sgr`] holds colour/effect escape sequences and width measurement.
//! - [`host_status`] is the per-host status block driven by outcomes.
//!
//! All state sits behind one mutex: status blocks are reprinted from
//! concurrently running worker threads.

pub mod host_status;
pub mod sgr;

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

pub use host_status::{HostState, HostStatus};
pub use sgr::{Color, Effect, Sgr, strip_sgr, visual_width};

/// Clear the whole current line, then move the cursor up one line.
const CLEAR_LINE_AND_ASCEND: &str = "\x1b[2K\x1b[1A";

/// Something that can be printed to the console and re-rendered later.
pub trait Content: Send + Sync {
    fn render(&self) -> String;
}

/// Fixed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock(pub String);

impl Content for TextBlock {
    fn render(&self) -> String {
        self.0.clone()
    }
}

/// 1-based screen coordinates, relative to where the console started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub row: usize,
    pub column: usize,
}

impl Default for CursorPosition {
    fn default() -> Self {
        Self { row: 1, column: 1 }
    }
}

impl CursorPosition {
    /// Where the cursor ends up after writing text of `extent` from here.
    pub fn after(self, extent: TextExtent) -> CursorPosition {
        if extent.line_count <= 1 {
            CursorPosition {
                row: self.row,
                column: self.column + extent.last_line_length,
            }
        } else {
            CursorPosition {
                row: self.row + extent.line_count - 1,
                column: 1 + extent.last_line_length,
            }
        }
    }
}

/// Size of a printed block: how many terminal lines it touches and how wide
/// its last line is (escape sequences excluded).
///
/// Text ending in a newline touches one more (empty) line than it has
/// newlines, so `"abc\n"` has `line_count == 2` and `last_line_length == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtent {
    pub line_count: usize,
    pub last_line_length: usize,
}

impl TextExtent {
    pub fn measure(text: &str) -> Self {
        let newlines = text.matches('\n').count();
        let last_line = text.rsplit('\n').next().unwrap_or("");
        Self {
            line_count: newlines + 1,
            last_line_length: visual_width(last_line),
        }
    }
}

/// Handle to a printed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// Where a history entry currently sits and how big it was when last drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub start: CursorPosition,
    pub extent: TextExtent,
}

struct HistoryEntry {
    content: Arc<dyn Content>,
    start: CursorPosition,
    extent: TextExtent,
}

struct ConsoleState {
    out: Box<dyn Write + Send>,
    cursor: CursorPosition,
    history: Vec<HistoryEntry>,
}

pub struct Console {
    state: Mutex<ConsoleState>,
    color: bool,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Console")
            .field("cursor", &state.cursor)
            .field("entries", &state.history.len())
            .field("color", &self.color)
            .finish()
    }
}

impl Console {
    /// Console writing to stdout.
    pub fn stdout(color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), color)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                out,
                cursor: CursorPosition::default(),
                history: Vec::new(),
            }),
            color,
        }
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    pub fn cursor_position(&self) -> CursorPosition {
        self.lock().cursor
    }

    pub fn entry(&self, id: EntryId) -> Option<EntrySnapshot> {
        self.lock().history.get(id.0).map(|entry| EntrySnapshot {
            start: entry.start,
            extent: entry.extent,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.lock().history.len()
    }

    /// Append `content` at the cursor and remember where it went.
    pub fn print(&self, content: Arc<dyn Content>) -> EntryId {
        let mut state = self.lock();
        let text = self.prepare(&content.render());
        let extent = TextExtent::measure(&text);
        let start = state.cursor;

        write_out(&mut state.out, &text);

        state.cursor = start.after(extent);
        state.history.push(HistoryEntry {
            content,
            start,
            extent,
        });
        EntryId(state.history.len() - 1)
    }

    pub fn print_text(&self, text: impl Into<String>) -> EntryId {
        self.print(Arc::new(TextBlock(text.into())))
    }

    /// Like [`Console::print_text`], adding a trailing newline when missing.
    pub fn puts(&self, text: impl Into<String>) -> EntryId {
        let mut text = text.into();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        self.print_text(text)
    }

    /// Redraw entry `id` from its current content.
    ///
    /// The cursor is walked up to the entry's first row (clearing every line
    /// on the way), the entry is written at its original column, and each
    /// later entry is re-emitted starting where its predecessor now ends.
    /// A later entry that shared a row with this entry's old last line thus
    /// follows the new last line; everything else moves by the change in
    /// this entry's line count.
    pub fn reprint(&self, id: EntryId) {
        let mut state = self.lock();
        let Some(start) = state.history.get(id.0).map(|entry| entry.start) else {
            warn!(entry = id.0, "reprint requested for unknown console entry");
            return;
        };

        let mut buf = String::new();
        for _ in start.row..state.cursor.row {
            buf.push_str(CLEAR_LINE_AND_ASCEND);
        }
        // Only clear from the entry's column: anything left of it belongs to
        // an earlier entry on the same row.
        buf.push_str(&format!("\x1b[{}G\x1b[0K", start.column));

        let mut position = start;
        for entry in state.history[id.0..].iter_mut() {
            let text = self.prepare(&entry.content.render());
            let extent = TextExtent::measure(&text);

            entry.start = position;
            entry.extent = extent;
            buf.push_str(&text);

            position = position.after(extent);
        }

        state.cursor = position;
        write_out(&mut state.out, &buf);
    }

    pub fn flush(&self) {
        let mut state = self.lock();
        if let Err(err) = state.out.flush() {
            warn!(error = %err, "failed to flush console output");
        }
    }

    /// Normalise text before it is written: carriage returns would move the
    /// real cursor without the history knowing, and colour is dropped when
    /// disabled.
    fn prepare(&self, text: &str) -> String {
        let text = text.replace("\r\n", "\n").replace('\r', "");
        if self.color {
            text
        } else {
            strip_sgr(&text).into_owned()
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_out(out: &mut Box<dyn Write + Send>, text: &str) {
    let res = out.write_all(text.as_bytes()).and_then(|_| out.flush());
    if let Err(err) = res {
        warn!(error = %err, "failed to write console output");
    }
}
