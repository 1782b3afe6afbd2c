//! Test harness helpers.

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber.
///
/// Output goes through the test writer so it is captured per test. Honours
/// `RUST_LOG`, defaulting to `debug` for Chronicle crates. Safe to call from
/// every test; only the first call installs anything.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chronicle_audit=debug,chronicle_storage=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
