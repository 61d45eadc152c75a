//! Structured logging setup.
//!
//! A library crate doesn't own the process's log destination, so this
//! only configures a stdout subscriber driven by `RUST_LOG`/`NOVAPIPE_LOG`;
//! callers embedding the engine elsewhere are free to install their own
//! `tracing` subscriber instead.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a global `tracing` subscriber writing to stdout.
///
/// Reads `NOVAPIPE_LOG` first, then `RUST_LOG`, defaulting to `info`.
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let filter = std::env::var("NOVAPIPE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
