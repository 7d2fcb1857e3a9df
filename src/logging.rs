//! `tracing` subscriber setup for embedders and tests.
//!
//! Kernels only emit events; installing a subscriber is left to the process
//! that embeds them. Both helpers honor `RUST_LOG` and fall back to `info`.

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Install a process-wide subscriber writing to `stdout`.
///
/// Returns `false` if another global subscriber was installed first, which
/// is left in place.
pub fn init_subscriber() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

/// Install a subscriber for the current thread only, captured by the test
/// harness, until the returned guard is dropped.
pub fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_test_writer())
        .set_default()
}
