use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use hostrun::engine::{Deferred, Operation};
use hostrun::errors::HostrunError;
use hostrun::exec;
use hostrun::outcome::{CallbackError, FailureReason, Outcome, Value};
use hostrun::script::Script;
use hostrun_test_utils::{FakeResponse, FakeTransport, init_tracing, test_context};
use serde_json::json;

type TestResult = Result<(), Box<dyn Error>>;

fn number(outcome: &Outcome) -> anyhow::Result<i64> {
    match outcome.value() {
        Value::Number(n) => n.as_i64().ok_or_else(|| anyhow!("not an integer: {n}")),
        Value::String(s) => Ok(s.trim().parse()?),
        other => Err(anyhow!("not a number: {other}")),
    }
}

fn final_value(result: hostrun::engine::ExecutionResult) -> Option<Value> {
    result
        .into_outcomes()
        .first()
        .and_then(|o| o.as_callback())
        .and_then(|o| o.value().cloned())
}

#[test]
fn callbacks_transform_the_previous_value() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond("web1", "echo 1", FakeResponse::ok("1\n"));
    let run = test_context(Arc::new(transport), &["web1"]);

    let result = Deferred::new(Operation::Command("echo 1".into()), run.ctx.hosts().clone(), "serial")
        .and_then(|_, prev, _| Ok(json!(number(prev)? + 1)))
        .and_then(|_, prev, _| Ok(json!(number(prev)? + 2)))
        .and_then(|_, prev, _| Ok(json!(number(prev)? * 4)))
        .run(&run.ctx)?;

    assert!(result.is_successful());
    assert_eq!(final_value(result), Some(json!(16)));
    assert_eq!(run.failures.call_count(), 0);
    Ok(())
}

#[test]
fn failing_stage_skips_the_rest_and_reports_once() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond_default("web1", FakeResponse::ok("1\n"));
    let run = test_context(Arc::new(transport), &["web1"]);
    let third_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&third_ran);

    let result = Deferred::new(Operation::Command("echo 1".into()), run.ctx.hosts().clone(), "parallel")
        .and_then(|_, prev, _| Ok(json!(number(prev)? + 1)))
        .and_then(|_, prev, _| {
            let n = number(prev)?;
            n.checked_div(0)
                .map(|v| json!(v))
                .ok_or_else(|| anyhow!("divided by zero"))
        })
        .and_then(move |_, _, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .run(&run.ctx)?;

    assert!(result.is_failed());
    let outcomes = result.into_outcomes();
    let last = outcomes[0].as_callback().ok_or("callback outcome")?;
    assert_eq!(last.error(), Some(&CallbackError::Raised("divided by zero".into())));
    assert!(!third_ran.load(Ordering::SeqCst));
    assert_eq!(run.failures.calls(), vec![vec!["web1".to_string()]]);
    Ok(())
}

#[test]
fn explicit_failure_is_distinct_from_a_raised_error() -> TestResult {
    init_tracing();
    let run = test_context(Arc::new(FakeTransport::new()), &["web1"]);

    let result = Deferred::new(Operation::Command("true".into()), run.ctx.hosts().clone(), "serial")
        .and_then(|_, _, outcome| {
            outcome.fail("quitting");
            Ok(json!("ignored"))
        })
        .run(&run.ctx)?;

    let outcomes = result.into_outcomes();
    let outcome = outcomes[0].as_callback().ok_or("callback outcome")?;
    let error = outcome.error().ok_or("error")?;
    assert!(error.is_explicit());
    assert_eq!(error, &CallbackError::Failed("quitting".into()));
    assert!(outcome.is_failed());
    Ok(())
}

#[test]
fn panicking_callback_is_captured() -> TestResult {
    init_tracing();
    let run = test_context(Arc::new(FakeTransport::new()), &["web1"]);

    let result = Deferred::new(Operation::Command("true".into()), run.ctx.hosts().clone(), "serial")
        .and_then(|_, _, _| panic!("callback blew up"))
        .run(&run.ctx)?;

    let outcomes = result.into_outcomes();
    let error = outcomes[0]
        .as_callback()
        .and_then(|o| o.error())
        .ok_or("error")?;
    assert_eq!(error, &CallbackError::Panicked("callback blew up".into()));
    assert_eq!(run.failures.call_count(), 1);
    Ok(())
}

#[test]
fn resolve_takes_precedence_over_the_return_value() -> TestResult {
    init_tracing();
    let run = test_context(Arc::new(FakeTransport::new()), &["web1"]);

    let result = Deferred::new(Operation::Command("true".into()), run.ctx.hosts().clone(), "serial")
        .and_then(|host, _, outcome| {
            outcome.resolve(json!({ "host": host.address() }));
            Ok(json!("returned"))
        })
        .run(&run.ctx)?;

    assert_eq!(final_value(result), Some(json!({ "host": "web1" })));
    Ok(())
}

#[test]
fn sibling_outcomes_survive_a_failed_stage() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond_default("web1", FakeResponse::ok("ok\n"));
    transport.respond_default("web2", FakeResponse::exit(1).stderr("disk full\n"));
    let run = test_context(Arc::new(transport), &["web1", "web2"]);
    let next_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&next_ran);

    let result = Deferred::new(Operation::Command("df".into()), run.ctx.hosts().clone(), "parallel")
        .and_then(move |_, prev, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(prev.value())
        })
        .run(&run.ctx)?;

    assert!(!next_ran.load(Ordering::SeqCst));
    let outcomes = result.into_outcomes();
    assert_eq!(outcomes.len(), 2);
    let ok = outcomes
        .iter()
        .find(|o| o.host().address() == "web1")
        .ok_or("web1 outcome")?;
    assert!(ok.is_successful());
    let failed = outcomes
        .iter()
        .find(|o| o.host().address() == "web2")
        .and_then(|o| o.as_command())
        .ok_or("web2 outcome")?;
    assert_eq!(failed.failure_reason(), Some(FailureReason::NonzeroExitStatus));
    assert_eq!(failed.stderr(), "disk full\n");
    assert_eq!(run.failures.calls(), vec![vec!["web2".to_string()]]);
    Ok(())
}

#[test]
fn unreachable_host_is_a_connection_error_outcome() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.refuse("db1", "connection refused");
    let run = test_context(Arc::new(transport), &["web1", "db1"]);

    let result = Deferred::new(Operation::Command("uptime".into()), run.ctx.hosts().clone(), "serial")
        .run(&run.ctx)?;

    let outcomes = result.into_outcomes();
    let db = outcomes[1].as_command().ok_or("command outcome")?;
    assert_eq!(db.failure_reason(), Some(FailureReason::ConnectionError));
    assert_eq!(db.started_at(), None);
    assert_eq!(db.finished_at(), None);
    assert!(outcomes[0].is_successful());
    assert!(run.output.contents().contains("FAILED"));
    assert!(run.output.contents().contains("Reason: connection refused"));
    Ok(())
}

#[test]
fn local_block_runs_once_against_localhost() -> TestResult {
    init_tracing();
    let run = test_context(Arc::new(FakeTransport::new()), &["web1", "web2"]);

    let result = Deferred::new(
        Operation::local("whoami", |_| Ok(json!("deploy"))),
        run.ctx.hosts().clone(),
        "parallel",
    )
    .and_then(|host, prev, _| Ok(json!(format!("{}:{}", host.address(), prev.value()))))
    .run(&run.ctx)?;

    let outcomes = result.into_outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].host().is_localhost());
    assert_eq!(outcomes[0].value(), json!("localhost:\"deploy\""));
    Ok(())
}

#[test]
fn status_lines_show_what_each_host_is_running() -> TestResult {
    init_tracing();
    let run = test_context(Arc::new(FakeTransport::new()), &["web1"]);

    Deferred::new(
        Operation::local("local step", |_| Ok(json!("ok"))),
        run.ctx.hosts().clone(),
        "serial",
    )
    .run(&run.ctx)?;
    Deferred::new(Operation::Command("whoami".into()), run.ctx.hosts().clone(), "serial")
        .run(&run.ctx)?;

    let text = run.output.contents();
    assert!(text.contains("localhost  DONE  local step\n"), "{text}");
    assert!(text.contains("  web1  DONE  whoami\n"), "{text}");
    Ok(())
}

#[test]
fn local_block_error_is_captured() -> TestResult {
    init_tracing();
    let run = test_context(Arc::new(FakeTransport::new()), &[]);

    let result = Deferred::new(
        Operation::local("broken", |_| Err(anyhow!("no such file"))),
        run.ctx.hosts().clone(),
        "serial",
    )
    .run(&run.ctx)?;

    assert!(result.is_failed());
    assert_eq!(run.failures.call_count(), 1);
    Ok(())
}

#[test]
fn script_is_installed_then_run() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond("web1", ".hostrun/scripts/deploy.sh", FakeResponse::ok("deployed\n"));
    let run = test_context(Arc::new(transport.clone()), &["web1"]);
    let script = Script::new("deploy.sh", "#!/bin/sh\necho deployed\n");

    let result = Deferred::new(Operation::Script(script), run.ctx.hosts().clone(), "serial")
        .run(&run.ctx)?;

    assert!(result.is_successful());
    assert_eq!(
        transport.commands("web1"),
        ["mkdir -p '.hostrun/scripts'", ".hostrun/scripts/deploy.sh"]
    );
    let uploads = transport.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].path, ".hostrun/scripts/deploy.sh");
    assert_eq!(uploads[0].mode, 0o755);
    assert_eq!(uploads[0].content, b"#!/bin/sh\necho deployed\n");
    assert_eq!(transport.connect_count("web1"), 1);
    Ok(())
}

#[test]
fn failed_script_upload_aborts_the_stage() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.fail_uploads("web1", "read-only file system");
    let run = test_context(Arc::new(transport), &["web1"]);

    let err = Deferred::new(
        Operation::Script(Script::new("deploy.sh", "true")),
        run.ctx.hosts().clone(),
        "serial",
    )
    .run(&run.ctx)
    .unwrap_err();

    match err {
        HostrunError::ScriptInstall { host, script, reason } => {
            assert_eq!(host, "ssh://web1");
            assert_eq!(script, "deploy.sh");
            assert!(reason.contains("read-only file system"));
        }
        other => return Err(format!("unexpected error: {other}").into()),
    }
    assert!(run.output.contents().contains("FAILED"));
    Ok(())
}

#[test]
fn failed_mkdir_aborts_the_stage() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond(
        "web1",
        "mkdir -p '.hostrun/scripts'",
        FakeResponse::exit(1).stderr("permission denied\n"),
    );
    let run = test_context(Arc::new(transport.clone()), &["web1"]);

    let err = exec::run_script(&run.ctx, &run.ctx.hosts().as_slice()[0], &Script::new("s", "true"))
        .unwrap_err();

    assert!(matches!(err, HostrunError::ScriptInstall { ref reason, .. } if reason.contains("permission denied")));
    assert!(transport.uploads().is_empty());
    Ok(())
}

#[test]
fn unreachable_host_during_script_install_is_an_outcome() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.refuse("web1", "timed out");
    let run = test_context(Arc::new(transport), &["web1"]);

    let outcome = exec::run_script(&run.ctx, &run.ctx.hosts().as_slice()[0], &Script::new("s", "true"))?;
    assert_eq!(outcome.failure_reason(), Some(FailureReason::ConnectionError));
    Ok(())
}

#[test]
fn sessions_are_reused_across_stages() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    let run = test_context(Arc::new(transport.clone()), &["web1", "web2"]);
    let web1 = &run.ctx.hosts().as_slice()[0];
    assert!(!run.ctx.sessions().is_connected(web1));

    for command in ["uptime", "who"] {
        Deferred::new(Operation::Command(command.into()), run.ctx.hosts().clone(), "parallel")
            .run(&run.ctx)?;
    }

    assert!(run.ctx.sessions().is_connected(web1));
    assert_eq!(transport.connect_count("web1"), 1);
    assert_eq!(transport.connect_count("web2"), 1);
    assert_eq!(transport.commands("web2"), ["uptime", "who"]);
    Ok(())
}

#[test]
fn pipeline_level_failure_handler_overrides_the_context() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond_default("web1", FakeResponse::exit(3));
    let run = test_context(Arc::new(transport), &["web1"]);
    let own = Arc::new(hostrun_test_utils::RecordingFailureHandler::default());

    Deferred::new(Operation::Command("false".into()), run.ctx.hosts().clone(), "serial")
        .on_failure(own.clone())
        .run(&run.ctx)?;

    assert_eq!(own.call_count(), 1);
    assert_eq!(run.failures.call_count(), 0);
    Ok(())
}

#[test]
fn upload_and_download_share_the_session() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    let run = test_context(Arc::new(transport.clone()), &["web1"]);
    let host = &run.ctx.hosts().as_slice()[0];

    exec::upload(&run.ctx, host, b"release=42\n", "app/.env", 0o600)?;
    let content = exec::download(&run.ctx, host, "app/.env")?;

    assert_eq!(content, b"release=42\n");
    assert_eq!(transport.connect_count("web1"), 1);
    Ok(())
}

#[test]
fn serial_stage_visits_hosts_in_collection_order() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond_default("web1", FakeResponse::ok("slow\n").delay(std::time::Duration::from_millis(50)));
    let run = test_context(Arc::new(transport.clone()), &["web1", "web2", "web3"]);

    let result = Deferred::new(Operation::Command("hostname".into()), run.ctx.hosts().clone(), "serial")
        .run(&run.ctx)?;

    assert_eq!(transport.execution_order(), ["web1", "web2", "web3"]);
    let order: Vec<String> = result
        .outcomes()
        .iter()
        .map(|o| o.host().address().to_string())
        .collect();
    assert_eq!(order, ["web1", "web2", "web3"]);
    Ok(())
}

#[test]
fn terminated_command_fails_with_its_signal() -> TestResult {
    init_tracing();
    let transport = FakeTransport::new();
    transport.respond_default("web1", FakeResponse::ok("half").signal("TERM"));
    let run = test_context(Arc::new(transport), &["web1"]);

    let outcome = exec::run_command(&run.ctx, &run.ctx.hosts().as_slice()[0], "sleep 100");

    assert_eq!(outcome.exit_signal(), Some("TERM"));
    assert_eq!(outcome.failure_reason(), Some(FailureReason::ExitSignal));
    assert_eq!(
        outcome.failure_summary().as_deref(),
        Some("STDOUT:\n  half\nSTDERR:\n  (empty)")
    );
    Ok(())
}
