//! Tracing output for tests.

use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test harness.
///
/// Honors `RUST_LOG` and defaults to `debug` for Relay crates. Safe to call
/// from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("relay_core=debug,relay_storage=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
