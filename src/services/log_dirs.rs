//! XDG-compliant log directory management
//!
//! Logs are stored in `$XDG_STATE_HOME/deskshell/logs/` (typically
//! `~/.local/state/deskshell/logs/`).
//!
//! Each shell instance writes a PID-based main log so concurrent runs do not
//! interleave. Errors from every run are appended to a shared `error.log`.
//! On startup, stale main logs from dead processes are cleaned up.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use crate::config_io::{DirectoryContext, APP_DIR_NAME};

/// Minimum age for log files to be cleaned up (24 hours)
const CLEANUP_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached log directory path
static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Get the base log directory, creating it if necessary.
///
/// Falls back to `~/.local/state/deskshell/logs/` if XDG_STATE_HOME is not
/// set, and to the system temp directory as a last resort.
pub fn log_dir() -> &'static PathBuf {
    LOG_DIR.get_or_init(|| {
        let fallback = std::env::temp_dir().join(format!("{APP_DIR_NAME}-logs"));
        let dir = get_xdg_log_dir().unwrap_or_else(|| fallback.clone());

        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Failed to create log directory {:?}: {}", dir, e);
            return fallback;
        }

        dir
    })
}

fn get_xdg_log_dir() -> Option<PathBuf> {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(state_home);
        if path.is_absolute() {
            return Some(path.join(APP_DIR_NAME).join("logs"));
        }
    }

    dirs::home_dir().map(|home| {
        home.join(".local")
            .join("state")
            .join(APP_DIR_NAME)
            .join("logs")
    })
}

/// Returns `{log_dir}/deskshell-{PID}.log`
pub fn main_log_path() -> PathBuf {
    log_dir().join(format!("{}-{}.log", APP_DIR_NAME, std::process::id()))
}

/// Returns `{log_dir}/error.log`
pub fn error_log_path() -> PathBuf {
    log_dir().join("error.log")
}

/// Remove PID-based log files left behind by processes that are gone.
pub fn cleanup_stale_logs() {
    cleanup_stale_logs_in_dir(log_dir(), std::process::id());
}

fn cleanup_stale_logs_in_dir(dir: &Path, current_pid: u32) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        if !name.ends_with(".log") {
            continue;
        }

        let Some(pid) = extract_pid_from_filename(&name) else {
            continue;
        };
        if pid == current_pid {
            continue;
        }

        if !is_process_running(pid)
            && is_file_older_than(&entry.path(), CLEANUP_AGE)
            && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
        {
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::debug!("Failed to clean up stale log {:?}: {}", entry.path(), e);
            } else {
                tracing::debug!("Cleaned up stale log file: {:?}", entry.path());
            }
        }
    }
}

fn is_file_older_than(path: &Path, age: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };

    SystemTime::now()
        .duration_since(modified)
        .map(|elapsed| elapsed > age)
        .unwrap_or(false)
}

/// Extract PID from a filename like "deskshell-12345.log"
fn extract_pid_from_filename(name: &str) -> Option<u32> {
    let without_ext = name.strip_suffix(".log")?;
    let last_hyphen = without_ext.rfind('-')?;
    without_ext[last_hyphen + 1..].parse().ok()
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        // Signal 0 only checks whether the process exists
        matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Print every directory the shell uses to stdout
pub fn print_all_paths(dirs: &DirectoryContext) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    writeln!(handle, "Deskshell directories:").ok();
    writeln!(handle).ok();
    writeln!(handle, "Home:       {}", dirs.home_dir.display()).ok();
    writeln!(handle, "  settings:     {}", dirs.settings_file.display()).ok();
    writeln!(handle, "  sessions/:    {}", dirs.sessions_dir().display()).ok();
    writeln!(handle).ok();
    writeln!(handle, "Themes:     {}", dirs.themes_dir.display()).ok();
    writeln!(
        handle,
        "  registry:     {}",
        dirs.themes_registry_file.display()
    )
    .ok();
    writeln!(handle).ok();
    writeln!(handle, "App root:   {}", dirs.app_root.display()).ok();
    writeln!(handle).ok();
    writeln!(handle, "Logs:       {}", log_dir().display()).ok();
    writeln!(handle, "  error.log:    {}", error_log_path().display()).ok();
}
