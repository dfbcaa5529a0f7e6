use std::error::Error;
use std::sync::Arc;

use hostrun::console::{Console, HostState, HostStatus};
use hostrun::host::Host;
use hostrun::outcome::{CommandOutcome, CommandState, FailureReason};
use hostrun::transport::{ChannelEvent, ConnectionError};
use hostrun_test_utils::{SharedBuffer, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

fn outcome() -> Result<CommandOutcome, Box<dyn Error>> {
    Ok(CommandOutcome::new(Host::parse("deploy@web1")?, "uptime"))
}

#[test]
fn successful_run_goes_idle_started_finished() -> TestResult {
    init_tracing();
    let mut o = outcome()?;
    assert_eq!(o.state(), CommandState::Idle);

    o.command_started();
    assert_eq!(o.state(), CommandState::Started);
    o.apply(ChannelEvent::Stdout(" 10:00 up ".into()));
    o.apply(ChannelEvent::Stdout("3 days\n".into()));
    o.apply(ChannelEvent::ExitStatus(0));
    o.apply(ChannelEvent::Closed);
    o.command_finished();

    assert_eq!(o.state(), CommandState::Finished);
    assert_eq!(o.stdout(), " 10:00 up 3 days\n");
    assert!(o.is_successful());
    assert!(!o.is_failed());
    assert_eq!(o.failure_reason(), None);
    assert_eq!(o.failure_summary(), None);
    assert!(o.duration().is_some());
    Ok(())
}

#[test]
fn nonzero_exit_is_classified_and_summarised() -> TestResult {
    init_tracing();
    let mut o = outcome()?;
    o.command_started();
    o.append_stdout("partial\nwork\n");
    o.set_exit_status(2);
    o.command_finished();

    assert!(o.is_failed());
    assert_eq!(o.failure_reason(), Some(FailureReason::NonzeroExitStatus));
    assert_eq!(
        o.failure_summary().as_deref(),
        Some("STDOUT:\n  partial\n  work\nSTDERR:\n  (empty)")
    );
    Ok(())
}

#[test]
fn signal_sets_the_reason_but_success_follows_the_status() -> TestResult {
    init_tracing();
    let mut o = outcome()?;
    o.command_started();
    o.set_exit_status(0);
    o.set_exit_signal("TERM");
    o.command_finished();

    assert_eq!(o.exit_signal(), Some("TERM"));
    assert_eq!(o.failure_reason(), Some(FailureReason::ExitSignal));
    assert!(o.is_successful());
    assert_eq!(o.failure_summary(), None);

    let mut killed = outcome()?;
    killed.command_started();
    killed.set_exit_signal("KILL");
    killed.command_finished();
    assert_eq!(killed.exit_status(), None);
    assert_eq!(killed.failure_reason(), Some(FailureReason::ExitSignal));
    assert!(killed.is_failed());
    Ok(())
}

#[test]
fn exit_fields_are_frozen_after_finish() -> TestResult {
    init_tracing();
    let mut o = outcome()?;
    o.command_started();
    o.append_stderr("warn\n");
    o.set_exit_status(0);
    o.command_finished();
    let finished_at = o.finished_at();

    o.set_exit_status(1);
    o.set_exit_signal("TERM");
    o.append_stderr("late\n");
    o.command_finished();

    assert_eq!(o.exit_status(), Some(0));
    assert_eq!(o.exit_signal(), None);
    assert_eq!(o.stderr(), "warn\n");
    assert_eq!(o.finished_at(), finished_at);
    assert!(o.is_successful());
    Ok(())
}

#[test]
fn second_exit_status_is_ignored_while_running() -> TestResult {
    let mut o = outcome()?;
    o.command_started();
    o.set_exit_status(3);
    o.set_exit_status(0);
    assert_eq!(o.exit_status(), Some(3));
    Ok(())
}

#[test]
fn out_of_order_transitions_are_ignored() -> TestResult {
    init_tracing();
    let mut o = outcome()?;

    o.command_finished();
    assert_eq!(o.state(), CommandState::Idle);

    o.command_started();
    let started_at = o.started_at();
    o.command_started();
    assert_eq!(o.started_at(), started_at);

    o.connection_failed(ConnectionError::new("too late"));
    assert_eq!(o.state(), CommandState::Started);
    assert_eq!(o.connection_error(), None);
    Ok(())
}

#[test]
fn connection_failure_never_starts() -> TestResult {
    init_tracing();
    let mut o = outcome()?;
    o.connection_failed(ConnectionError::new("connection refused"));

    assert_eq!(o.state(), CommandState::ConnectionFailed);
    assert_eq!(o.failure_reason(), Some(FailureReason::ConnectionError));
    assert_eq!(o.started_at(), None);
    assert_eq!(o.finished_at(), None);
    assert!(o.is_failed());
    assert_eq!(
        o.failure_summary().as_deref(),
        Some("Code: -1\nReason: connection refused")
    );

    o.command_started();
    assert_eq!(o.started_at(), None);
    Ok(())
}

#[test]
fn successful_and_failed_are_exclusive() -> TestResult {
    for status in [-1, 0, 1, 2, 127, 255] {
        let mut o = outcome()?;
        o.command_started();
        o.set_exit_status(status);
        o.command_finished();
        assert_ne!(o.is_successful(), o.is_failed());
        assert_eq!(o.is_successful(), status == 0);
    }
    Ok(())
}

#[test]
fn paired_status_follows_the_outcome() -> TestResult {
    init_tracing();
    let buffer = SharedBuffer::new();
    let console = Arc::new(Console::with_writer(Box::new(buffer.clone()), false));
    let host = Host::parse("web1")?;

    let ok_status = HostStatus::new(Arc::clone(&console), &host, 4);
    let mut ok = CommandOutcome::new(host.clone(), "true").with_status(ok_status.clone());
    ok.command_started();
    assert_eq!(ok_status.state(), HostState::Running);
    ok.set_exit_status(0);
    ok.command_finished();
    assert_eq!(ok_status.state(), HostState::Done);

    let failed_status = HostStatus::new(Arc::clone(&console), &host, 4);
    let mut unreachable = CommandOutcome::new(host, "true").with_status(failed_status.clone());
    unreachable.connection_failed(ConnectionError::new("no route to host"));
    assert_eq!(
        failed_status.state(),
        HostState::Failed(Some("Code: -1\nReason: no route to host".to_string()))
    );
    assert!(buffer.contents().contains("      Reason: no route to host\n"));
    Ok(())
}
