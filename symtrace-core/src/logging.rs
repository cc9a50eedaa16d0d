//! Structured logging using **tracing**.
//!
//! The engines emit `debug!` events per pass, an `info!` summary per run and
//! `warn!` for degraded files. Binaries choose a subscriber once at startup.

use tracing::{error, info, warn};

/// Initializes the global tracing subscriber with JSON output on stderr.
///
/// Call *once* at the beginning of the application's runtime.
///
/// # Environment Variables
/// - `RUST_LOG`: Controls log filtering (e.g., `RUST_LOG=symtrace_core=debug`)
pub fn init_structured_logging() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_current_span(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initializes a human-readable subscriber on stderr.
pub fn init_pretty_logging() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs a warning event.
pub fn log_warn(message: &str) {
    warn!(detail = %message);
}

/// Logs an info event.
pub fn log_info(message: &str) {
    info!(detail = %message);
}

/// Logs an error event.
pub fn log_error(message: &str) {
    error!(detail = %message);
}

/// Logs a custom event, mapping the event name to a level.
pub fn log_event(event: &str, detail: &str) {
    match event.to_uppercase().as_str() {
        "ERROR" => error!(event = %event, detail = %detail),
        "WARN" | "WARNING" => warn!(event = %event, detail = %detail),
        _ => info!(event = %event, detail = %detail),
    }
}
