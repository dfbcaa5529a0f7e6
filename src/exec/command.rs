// src/exec/command.rs

use std::sync::Arc;

use tracing::{debug, error};

use crate::console::HostStatus;
use crate::context::Context;
use crate::host::Host;
use crate::outcome::CommandOutcome;
use crate::transport::Session;

/// Status reported when the transport breaks in the middle of a command.
pub(crate) const TRANSPORT_FAILURE_STATUS: i32 = -1;

/// Run `command` on `host` and return its finished outcome.
///
/// Never fails: an unreachable host comes back as a `connection_error`
/// outcome, a failing command as a non-zero exit status or signal.
pub fn run_command(ctx: &Context, host: &Host, command: &str) -> CommandOutcome {
    let (mut outcome, _status) = start_outcome(ctx, host, command);

    match ctx.sessions().session(host) {
        Ok(session) => drive(session.as_ref(), &mut outcome),
        Err(err) => outcome.connection_failed(err),
    }
    outcome
}

/// New idle outcome with its status line already printed.
pub(crate) fn start_outcome(
    ctx: &Context,
    host: &Host,
    command: &str,
) -> (CommandOutcome, HostStatus) {
    let status = HostStatus::describing(Arc::clone(ctx.console()), host, ctx.hostname_width(), command);
    let outcome = CommandOutcome::new(host.clone(), command).with_status(status.clone());
    (outcome, status)
}

/// Run the outcome's command on an open session, from `Idle` to `Finished`.
pub(crate) fn drive(session: &dyn Session, outcome: &mut CommandOutcome) {
    outcome.command_started();

    let command = outcome.command().to_string();
    let executed = session.execute(&command, &mut |event| outcome.apply(event));
    if let Err(err) = executed {
        error!(host = %outcome.host(), command = %command, error = %err, "command execution error");
        outcome.append_stderr(&format!("{err}\n"));
        outcome.set_exit_status(TRANSPORT_FAILURE_STATUS);
    }

    outcome.command_finished();
    debug!(
        host = %outcome.host(),
        command = %command,
        successful = outcome.is_successful(),
        "command outcome ready"
    );
}
