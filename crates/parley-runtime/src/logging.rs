//! Logging bootstrap

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered at `level`
///
/// `RUST_LOG` takes precedence when set. Returns false if a global
/// subscriber was already installed, so calling this more than once is
/// harmless.
pub fn init(level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley_core={0},parley_runtime={0}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init()
        .is_ok()
}

/// Quiet subscriber writing through the test harness capture
pub fn init_for_tests() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init()
        .is_ok()
}
