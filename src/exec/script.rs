// src/exec/script.rs

use tracing::{debug, info};

use crate::context::Context;
use crate::errors::{HostrunError, Result};
use crate::exec::command::{drive, start_outcome};
use crate::host::Host;
use crate::outcome::CommandOutcome;
use crate::script::Script;
use crate::transport::{ChannelEvent, Session, shell_quote};

/// Mode of installed scripts.
const SCRIPT_MODE: u32 = 0o755;

/// Install `script` on `host` and run it.
///
/// - The connect failing is an ordinary `connection_error` outcome.
/// - Creating the install directory or uploading failing is an
///   [`HostrunError::ScriptInstall`], which aborts the whole stage.
/// - The script itself failing is a normal failed outcome.
pub fn run_script(ctx: &Context, host: &Host, script: &Script) -> Result<CommandOutcome> {
    let (mut outcome, status) = start_outcome(ctx, host, &script.install_path());

    let session = match ctx.sessions().session(host) {
        Ok(session) => session,
        Err(err) => {
            outcome.connection_failed(err);
            return Ok(outcome);
        }
    };

    if let Err(err) = install(session.as_ref(), host, script) {
        status.failed(Some(err.to_string()));
        return Err(err);
    }

    drive(session.as_ref(), &mut outcome);
    Ok(outcome)
}

fn install(session: &dyn Session, host: &Host, script: &Script) -> Result<()> {
    let install_error = |reason: String| HostrunError::ScriptInstall {
        host: host.to_string(),
        script: script.name().to_string(),
        reason,
    };

    let mkdir = format!("mkdir -p {}", shell_quote(script.install_directory()));
    let mut exit_status = None;
    let mut exit_signal = None;
    let mut stderr = String::new();
    session
        .execute(&mkdir, &mut |event| match event {
            ChannelEvent::ExitStatus(code) => exit_status = Some(code),
            ChannelEvent::ExitSignal(signal) => exit_signal = Some(signal),
            ChannelEvent::Stderr(chunk) => stderr.push_str(&chunk),
            ChannelEvent::Stdout(_) | ChannelEvent::Closed => {}
        })
        .map_err(|err| install_error(format!("creating {}: {err}", script.install_directory())))?;

    match (exit_status, exit_signal) {
        (Some(0), None) => {}
        (_, Some(signal)) => {
            return Err(install_error(format!("`{mkdir}` killed by signal {signal}")));
        }
        (code, None) => {
            return Err(install_error(format!(
                "`{mkdir}` exited with {}: {}",
                code.map_or_else(|| "no status".to_string(), |c| c.to_string()),
                stderr.trim()
            )));
        }
    }
    debug!(host = %host, dir = script.install_directory(), "install directory ready");

    let path = script.install_path();
    session
        .upload(script.content().as_bytes(), &path, SCRIPT_MODE)
        .map_err(|err| install_error(format!("uploading to {path}: {err}")))?;
    info!(host = %host, script = script.name(), path = %path, "script installed");
    Ok(())
}
