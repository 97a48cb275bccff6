//! Tracing subscriber setup for binaries built on Plaza.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info` when `RUST_LOG` is unset or unparsable. Calling
/// it twice (or after another subscriber is set) is harmless; the
/// second call is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
