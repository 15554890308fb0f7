//! Log capture for tests.
//!
//! `capture_logs` installs a thread-local subscriber, so parallel tests do
//! not see each other's events. Futures driven by `#[tokio::test]` run on
//! the test thread and are captured as well.

use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::prelude::*;

/// A captured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Handle to the events recorded while its guard is alive.
#[derive(Clone, Default)]
pub struct LogCapture {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogCapture {
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn contains(&self, level: Level, message: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(message))
    }

    #[must_use]
    pub fn find(&self, message: &str) -> Option<LogEntry> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.message.contains(message))
            .cloned()
    }

    #[must_use]
    pub fn has_level(&self, level: Level) -> bool {
        self.entries.lock().iter().any(|e| e.level == level)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Render captured events for assertion failure messages.
    #[must_use]
    pub fn display(&self) -> String {
        let entries = self.entries.lock();
        if entries.is_empty() {
            return String::from("No logs captured");
        }
        let mut out = format!("Captured {} log entries:\n", entries.len());
        for entry in entries.iter() {
            let _ = writeln!(out, "[{}] {}: {}", entry.level, entry.target, entry.message);
            for (key, value) in &entry.fields {
                let _ = writeln!(out, "    {key} = {value}");
            }
        }
        out
    }
}

struct CaptureLayer {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        self.entries.lock().push(LogEntry {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Capture every event at `TRACE` and above on the current thread until the
/// returned guard is dropped.
#[must_use]
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let layer = CaptureLayer {
        entries: Arc::clone(&capture.entries),
    };
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

/// Assert that a capture holds an event with the given level and message.
#[macro_export]
macro_rules! assert_log_contains {
    ($capture:expr, $level:expr, $message:expr) => {{
        let capture = &$capture;
        assert!(
            capture.contains($level, $message),
            "Expected log with level {} containing '{}'\n{}",
            $level,
            $message,
            capture.display()
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};

    #[test]
    fn test_captures_message_and_fields() {
        let (capture, _guard) = capture_logs();
        warn!(source = "lexical", "ranking source degraded");

        let entry = capture.find("degraded").unwrap();
        assert_eq!(entry.level, Level::WARN);
        assert_eq!(entry.field("source"), Some("lexical"));
        crate::assert_log_contains!(capture, Level::WARN, "ranking source");
    }

    #[test]
    fn test_guard_scopes_capture() {
        let (capture, guard) = capture_logs();
        info!("inside");
        drop(guard);
        info!("outside");

        assert!(capture.contains(Level::INFO, "inside"));
        assert!(!capture.contains(Level::INFO, "outside"));
        capture.clear();
        assert!(capture.display().contains("No logs captured"));
    }
}
