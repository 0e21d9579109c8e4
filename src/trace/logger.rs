use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::trace::trace::TraceEvent;

/// Append-only JSONL sink for cache and resolver decisions.
///
/// Write failures are logged and swallowed; tracing never fails the caller.
pub struct TraceLogger {
    sink: Option<Mutex<File>>,
}

impl TraceLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => TraceLogger {
                sink: Some(Mutex::new(file)),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file, decision trace disabled");
                TraceLogger::disabled()
            }
        }
    }

    /// A logger that drops every event.
    pub fn disabled() -> Self {
        TraceLogger { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn log(&self, event: &TraceEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(event = %event.event, error = %e, "failed to serialize trace event");
                return;
            }
        };

        let mut file = sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{}", line) {
            warn!(event = %event.event, error = %e, "failed to write trace event");
        }
    }
}

impl Default for TraceLogger {
    fn default() -> Self {
        TraceLogger::disabled()
    }
}
