//! Logging services
//!
//! Log file locations and tracing subscriber setup shared by the binary and
//! tests.

pub mod error_log;
pub mod log_dirs;
pub mod tracing_setup;
