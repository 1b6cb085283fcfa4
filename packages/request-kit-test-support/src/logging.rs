//! Test log output.
//!
//! Guard teardown swallows rollback and close failures after logging them,
//! so tests asserting on those paths are easier to debug with
//! `TEST_LOG=request_kit=debug`.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INSTALLED: OnceCell<()> = OnceCell::new();

const DEFAULT_DIRECTIVES: &str = "warn";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env("TEST_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the test subscriber once per test binary.
///
/// Safe to call from every test; later calls do nothing, and a subscriber
/// installed elsewhere is left alone.
pub fn init() {
    INSTALLED.get_or_init(|| {
        let _ = fmt()
            .with_env_filter(filter())
            .with_test_writer()
            .with_target(true)
            .without_time()
            .try_init();
    });
}
