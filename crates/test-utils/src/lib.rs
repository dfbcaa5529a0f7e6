pub mod builders;
pub mod capture;
pub mod fake_transport;

use std::sync::{Arc, Once};

use hostrun::console::Console;
use hostrun::context::Context;
use hostrun::host::HostCollection;
use hostrun::transport::Transport;
use tracing_subscriber::{EnvFilter, fmt};

pub use capture::{RecordingFailureHandler, SharedBuffer};
pub use fake_transport::{FakeResponse, FakeTransport, Upload};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Everything a test needs to inspect after a run.
pub struct TestRun {
    pub ctx: Context,
    pub output: SharedBuffer,
    pub failures: Arc<RecordingFailureHandler>,
}

/// Context over `hosts` and `transport`, printing (without colour) into an
/// in-memory buffer and recording failures instead of exiting.
pub fn test_context(transport: Arc<dyn Transport>, hosts: &[&str]) -> TestRun {
    let output = SharedBuffer::new();
    let failures = Arc::new(RecordingFailureHandler::default());
    let console = Arc::new(Console::with_writer(Box::new(output.clone()), false));
    let hosts = HostCollection::parse(hosts).expect("test hosts parse");

    let ctx = Context::builder(transport)
        .console(console)
        .hosts(hosts)
        .failure_handler(failures.clone())
        .build();

    TestRun {
        ctx,
        output,
        failures,
    }
}
