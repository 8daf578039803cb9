//! ABOUTME: Structured logging initialization shared by every instance role
//! ABOUTME: Thin wrapper over tracing-subscriber's env-filter + fmt layers

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging for a noema process.
///
/// Honors `RUST_LOG`/`NOEMA_LOG` for level selection and falls back to
/// `info` for noema crates, `warn` for dependencies. Safe to call more than
/// once per process; subsequent calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("NOEMA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn,noema=info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
