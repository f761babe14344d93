//! Tracing initialisation helpers for tests.
//!
//! The subscriber is initialised at most once per process, so
//! [`init_test_tracing`] is safe to call from every test function.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes to the test-harness writer, filtered by
/// `RUST_LOG` (default `runebot_core=debug,warn`).
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     runebot_test_utils::tracing_setup::init_test_tracing();
///     // bot logs are now captured by the test harness
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("runebot_core=debug,warn")),
        )
        .with_test_writer()
        .try_init();
}
