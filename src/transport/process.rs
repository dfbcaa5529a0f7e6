// src/transport/process.rs

//! Streaming a child process as channel events.
//!
//! Shared by the `ssh` and local transports: both end up running a local
//! process whose stdout/stderr are the command's channel.

use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, trace, warn};

use crate::errors::{HostrunError, Result};
use crate::transport::ChannelEvent;

const READ_CHUNK: usize = 8192;

/// Spawn `cmd` and forward its output and exit as [`ChannelEvent`]s.
///
/// stdout and stderr are each drained on their own reader thread and
/// funnelled through one channel, so `on_event` always runs on the calling
/// thread. The final events are the exit status (or signal) and `Closed`.
pub(crate) fn stream_command(
    mut cmd: Command,
    label: &str,
    on_event: &mut dyn FnMut(ChannelEvent),
) -> Result<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|err| HostrunError::Transport {
        host: label.to_string(),
        reason: format!("failed to spawn process: {err}"),
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (tx, rx) = mpsc::channel::<ChannelEvent>();

    let mut readers = Vec::new();
    if let Some(stdout) = stdout {
        readers.push(spawn_reader(stdout, label, "stdout", ChannelEvent::Stdout, tx.clone()));
    }
    if let Some(stderr) = stderr {
        readers.push(spawn_reader(stderr, label, "stderr", ChannelEvent::Stderr, tx.clone()));
    }
    drop(tx);

    for event in rx {
        trace!(process = %label, ?event, "channel event");
        on_event(event);
    }

    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait().map_err(|err| HostrunError::Transport {
        host: label.to_string(),
        reason: format!("failed to wait on process: {err}"),
    })?;

    debug!(process = %label, ?status, "process exited");
    on_event(exit_event(status));
    on_event(ChannelEvent::Closed);
    Ok(())
}

/// Exit status, or the terminating signal's name when there is no status.
pub(crate) fn exit_event(status: ExitStatus) -> ChannelEvent {
    if let Some(code) = status.code() {
        return ChannelEvent::ExitStatus(code);
    }
    match signal_name(status) {
        Some(name) => ChannelEvent::ExitSignal(name),
        None => ChannelEvent::ExitStatus(-1),
    }
}

#[cfg(unix)]
fn signal_name(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    let number = status.signal()?;
    let name = match nix::sys::signal::Signal::try_from(number) {
        Ok(signal) => signal
            .as_str()
            .trim_start_matches("SIG")
            .to_string(),
        Err(_) => number.to_string(),
    };
    Some(name)
}

#[cfg(not(unix))]
fn signal_name(_status: ExitStatus) -> Option<String> {
    None
}

fn spawn_reader(
    source: impl Read + Send + 'static,
    label: &str,
    stream: &'static str,
    wrap: fn(String) -> ChannelEvent,
    tx: mpsc::Sender<ChannelEvent>,
) -> thread::JoinHandle<()> {
    let label = label.to_string();
    thread::spawn(move || {
        let read = read_chunks(source, |chunk| {
            let _ = tx.send(wrap(chunk));
        });
        if let Err(err) = read {
            warn!(process = %label, stream, error = %err, "reading process output failed; output is truncated");
        }
    })
}

/// Read `source` to the end, handing out UTF-8 chunks as they arrive.
///
/// A multi-byte character split across two reads is held back until it is
/// complete; invalid bytes are replaced. On a read error, whatever was
/// already read is emitted before the error is returned.
pub fn read_chunks(mut source: impl Read, mut emit: impl FnMut(String)) -> io::Result<()> {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; READ_CHUNK];

    let outcome = loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => break Err(err),
        };
        pending.extend_from_slice(&buf[..n]);

        let complete = match std::str::from_utf8(&pending) {
            Ok(_) => pending.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => pending.len(),
        };
        if complete == 0 {
            continue;
        }

        let rest = pending.split_off(complete);
        emit(String::from_utf8_lossy(&pending).into_owned());
        pending = rest;
    };

    if !pending.is_empty() {
        emit(String::from_utf8_lossy(&pending).into_owned());
    }
    outcome
}

/// Quote `value` for a POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
