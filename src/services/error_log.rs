//! Error log layer for tracing
//!
//! Mirrors ERROR events into a separate append-only `error.log`. Duplicate
//! messages seen within a short window are suppressed and counted.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Deduplication state for error messages
struct DeduplicationState {
    /// Map from message hash to (last_seen_time, count)
    recent_messages: HashMap<u64, (Instant, usize)>,
    /// Messages repeated within this window are suppressed
    window: Duration,
    /// Maximum number of unique messages to track
    max_entries: usize,
}

impl DeduplicationState {
    fn new() -> Self {
        Self {
            recent_messages: HashMap::new(),
            window: Duration::from_secs(5),
            max_entries: 100,
        }
    }

    /// Returns (should_log, suppressed_count); the count is non-zero when a
    /// message is logged again after duplicates were dropped.
    fn check_message(&mut self, message: &str, now: Instant) -> (bool, usize) {
        let hash = hash_message(message);

        if self.recent_messages.len() > self.max_entries {
            let window = self.window;
            self.recent_messages
                .retain(|_, (time, _)| now.duration_since(*time) < window * 2);
        }

        match self.recent_messages.get_mut(&hash) {
            Some((last_seen, count)) if now.duration_since(*last_seen) < self.window => {
                *count += 1;
                *last_seen = now;
                (false, 0)
            }
            Some((last_seen, count)) => {
                let suppressed = count.saturating_sub(1);
                *count = 1;
                *last_seen = now;
                (true, suppressed)
            }
            None => {
                self.recent_messages.insert(hash, (now, 1));
                (true, 0)
            }
        }
    }
}

fn hash_message(message: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    message.hash(&mut hasher);
    hasher.finish()
}

/// A tracing layer that appends ERROR events to a file
pub struct ErrorLogLayer {
    file: Arc<Mutex<File>>,
    dedup: Arc<Mutex<DeduplicationState>>,
    path: PathBuf,
}

impl ErrorLogLayer {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Create an error log layer writing to the shared error log
pub fn create() -> std::io::Result<ErrorLogLayer> {
    create_with_path(super::log_dirs::error_log_path())
}

/// Create an error log layer with a specific path (for testing)
pub fn create_with_path(path: PathBuf) -> std::io::Result<ErrorLogLayer> {
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    Ok(ErrorLogLayer {
        file: Arc::new(Mutex::new(file)),
        dedup: Arc::new(Mutex::new(DeduplicationState::new())),
        path,
    })
}

impl<S> Layer<S> for ErrorLogLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level != Level::ERROR {
            return;
        }

        let mut visitor = StringVisitor::default();
        event.record(&mut visitor);

        let (should_log, suppressed_count) = match self.dedup.lock() {
            Ok(mut dedup) => dedup.check_message(&visitor.0, Instant::now()),
            Err(_) => (true, 0),
        };
        if !should_log {
            return;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let target = event.metadata().target();
        let line = if suppressed_count > 0 {
            format!(
                "{} {} {}: {} (suppressed {} similar messages)\n",
                timestamp, level, target, visitor.0, suppressed_count
            )
        } else {
            format!("{} {} {}: {}\n", timestamp, level, target, visitor.0)
        };

        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
    }
}

/// Simple visitor to extract message from event
#[derive(Default)]
struct StringVisitor(String);

impl StringVisitor {
    fn push_field(&mut self, name: &str, value: String) {
        if name == "message" {
            self.0 = value;
        } else if self.0.is_empty() {
            self.0 = format!("{name}={value}");
        } else {
            self.0.push_str(&format!(" {name}={value}"));
        }
    }
}

impl tracing::field::Visit for StringVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push_field(field.name(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push_field(field.name(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_suppresses_within_window() {
        let mut state = DeduplicationState::new();
        let start = Instant::now();

        assert_eq!(state.check_message("boom", start), (true, 0));
        assert_eq!(
            state.check_message("boom", start + Duration::from_secs(1)),
            (false, 0)
        );
        assert_eq!(
            state.check_message("boom", start + Duration::from_secs(2)),
            (false, 0)
        );
        assert_eq!(state.check_message("other", start), (true, 0));

        // Outside the window: logged again, reporting the dropped repeats
        assert_eq!(
            state.check_message("boom", start + Duration::from_secs(10)),
            (true, 2)
        );
    }

    #[test]
    fn test_visitor_formats_fields() {
        let mut visitor = StringVisitor::default();
        visitor.push_field("message", "failed".to_string());
        visitor.push_field("path", "/x".to_string());
        assert_eq!(visitor.0, "failed path=/x");
    }
}
