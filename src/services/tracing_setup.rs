//! Tracing subscriber setup
//!
//! Shared tracing configuration used by the binary and by tests.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use super::error_log::ErrorLogLayer;

/// Initialize the global tracing subscriber.
///
/// This sets up:
/// - File-based logging to `log_file_path`
/// - Environment-based filtering (RUST_LOG), defaulting to `default_level`
/// - The error log layer mirroring ERROR events to the shared error log
///
/// Returns false if the log file could not be created.
pub fn init_global(log_file_path: &Path, default_level: &str) -> bool {
    let Ok(log_file) = File::create(log_file_path) else {
        return false;
    };
    let error_layer = super::error_log::create().ok();

    build_subscriber(log_file, default_level, error_layer).init();
    install_panic_hook();
    true
}

/// Build a subscriber with file logging and an optional error layer.
pub fn build_subscriber(
    log_file: File,
    default_level: &str,
    error_layer: Option<ErrorLogLayer>,
) -> impl tracing::Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = fmt::layer().with_ansi(false).with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .with(error_layer)
}

/// Log panics with a backtrace before handing over to the previous hook.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        tracing::error!("Panic at {}: {}\n{}", location, payload, backtrace);
        previous(info);
    }));
}
