//! Process-wide logging setup.
//!
//! The teacher declares `tracing`/`tracing-subscriber` in its manifest but
//! never wires them up (its Tauri host does logging for it). This crate
//! runs as a bare binary, so it owns its own subscriber.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber. Honors `RUST_LOG`; defaults to
/// `info` for this crate and `warn` for dependencies.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,ttskit_rs=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok();
}
