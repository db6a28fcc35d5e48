//! Logging setup for decode diagnostics.
//!
//! The crate logs through the `log` facade only: one warn line per dropped
//! or partial telegram, info for lenient driver matches, debug for the
//! byte-level trail. [`init_logger`] wires those lines to `env_logger` for
//! binaries and tests that bring no logger of their own.

use log::{debug, error, info, log_enabled, warn, Level, LevelFilter};

/// Initializes the logger with the `env_logger` crate, reading the level
/// from `RUST_LOG`.
///
/// Call once at startup; decode diagnostics are emitted through the `log`
/// facade and end up wherever the host application routes them.
pub fn init_logger() {
    env_logger::init();
}

/// Initializes `env_logger` at a fixed level, ignoring `RUST_LOG`.
///
/// Safe to call more than once; later calls keep the first configuration.
pub fn init_logger_at(level: LevelFilter) {
    let _ = env_logger::Builder::new().filter_level(level).try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}
