use std::error::Error;
use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hostrun::errors::HostrunError;
use hostrun::vars::{Variable, VariableSet};
use hostrun_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn literals_and_templates_resolve() -> TestResult {
    let mut vars = VariableSet::new();
    vars.set("app", "shop");
    vars.set("release_dir", Variable::from_config("/srv/%{app}/releases"));
    vars.set("plain", Variable::from_config("no placeholders"));

    assert_eq!(vars.get("app")?, "shop");
    assert_eq!(vars.get("release_dir")?, "/srv/shop/releases");
    assert!(matches!(Variable::from_config("no placeholders"), Variable::Literal(_)));
    assert!(matches!(Variable::from_config("%{app}"), Variable::Thunk(_)));
    assert_eq!(vars.names().collect::<Vec<_>>(), ["app", "plain", "release_dir"]);
    Ok(())
}

#[test]
fn thunks_are_evaluated_once() -> TestResult {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut vars = VariableSet::new();
    vars.set(
        "revision",
        Variable::thunk(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("a1b2c3".to_string())
        }),
    );

    assert_eq!(vars.get("revision")?, "a1b2c3");
    assert_eq!(vars.interpolate("rev=%{revision}")?, "rev=a1b2c3");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn redefining_a_variable_clears_memoized_values() -> TestResult {
    let mut vars = VariableSet::new();
    vars.set("app", "shop");
    vars.set("dir", Variable::template("/srv/%{app}"));
    assert_eq!(vars.get("dir")?, "/srv/shop");

    vars.set("app", "blog");
    assert_eq!(vars.get("dir")?, "/srv/blog");
    Ok(())
}

#[test]
fn missing_variable_is_an_error() {
    let vars = VariableSet::new();
    assert!(matches!(
        vars.get("nope"),
        Err(HostrunError::VariableNotFound(ref name)) if name == "nope"
    ));
    assert!(matches!(
        vars.interpolate("a %{nope} b"),
        Err(HostrunError::VariableNotFound(_))
    ));
}

#[test]
fn self_reference_is_a_cycle_not_a_hang() {
    let mut vars = VariableSet::new();
    vars.set("a", Variable::template("x%{b}"));
    vars.set("b", Variable::template("y%{a}"));

    assert!(matches!(vars.get("a"), Err(HostrunError::VariableCycle(ref name)) if name == "a"));
    // The failed evaluation leaves nothing behind.
    vars.set("b", "fixed");
    assert!(matches!(vars.get("a").as_deref(), Ok("xfixed")));
}

#[test]
fn lenient_interpolation_keeps_unknown_placeholders() -> TestResult {
    init_tracing();
    let mut vars = VariableSet::new();
    vars.set("user", "deploy");

    assert_eq!(
        vars.interpolate_lenient("%{user} owns %{dir}, not %{ user }"),
        "deploy owns %{dir}, not %{ user }"
    );
    assert_eq!(vars.interpolate("100% {user}")?, "100% {user}");
    Ok(())
}

#[test]
fn concurrent_lookups_share_one_evaluation() -> TestResult {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut vars = VariableSet::new();
    vars.set("stage", "production");
    vars.set(
        "slow",
        Variable::thunk(move |vars| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            vars.interpolate("release-%{stage}")
        }),
    );

    let start = Barrier::new(8);
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                start.wait();
                assert_eq!(vars.get("slow").ok().as_deref(), Some("release-production"));
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn failed_evaluation_is_retried_by_the_next_lookup() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut vars = VariableSet::new();
    vars.set(
        "flaky",
        Variable::thunk(move |_| match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Err(HostrunError::VariableNotFound("clock".into())),
            _ => Ok("ok".to_string()),
        }),
    );

    assert!(vars.get("flaky").is_err());
    assert!(matches!(vars.get("flaky").as_deref(), Ok("ok")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn clones_are_independent() -> TestResult {
    let mut vars = VariableSet::new();
    vars.set("stage", "production");
    let mut copy = vars.clone();
    copy.set("stage", "staging");

    assert_eq!(vars.get("stage")?, "production");
    assert_eq!(copy.get("stage")?, "staging");
    assert_eq!(copy.len(), 1);
    assert!(copy.contains("stage"));
    Ok(())
}
