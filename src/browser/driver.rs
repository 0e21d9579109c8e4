use std::time::Duration;

use thiserror::Error;

use crate::element::element_model::{ElementHandle, ElementSet, LiveMatch};

/// What a live lookup is asked to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveQuery {
    /// CSS selector evaluated against the live document.
    Selector(String),
    /// A handle from a previous snapshot, checked for current resolvability.
    Handle(ElementHandle),
}

impl LiveQuery {
    pub fn describe(&self) -> String {
        match self {
            LiveQuery::Selector(s) => format!("selector {}", s),
            LiveQuery::Handle(h) => format!("handle {}", h),
        }
    }
}

/// Snapshot source and live lookup for one page session.
///
/// Every call carries a timeout. Implementations must return within it
/// (reporting `DriverError::Timeout`) rather than blocking indefinitely.
pub trait PageDriver {
    /// URL of the page currently loaded.
    fn current_url(&mut self) -> Result<String, DriverError>;

    /// Current interactive/visible elements of the page.
    fn snapshot(&mut self, timeout: Duration) -> Result<ElementSet, DriverError>;

    /// First element matching `query`, or `None` when nothing matches.
    fn live_lookup(
        &mut self,
        query: &LiveQuery,
        timeout: Duration,
    ) -> Result<Option<LiveMatch>, DriverError>;
}

#[derive(Debug, Error)]
pub enum DriverError {
    /// Page helper process failed to spawn
    #[error("failed to spawn {script} (is Node.js installed?): {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the page helper failed
    #[error("page helper I/O error: {0}")]
    Io(String),

    /// Page helper answered, but reported failure or omitted required data
    #[error("page helper command '{command}' failed: {error}")]
    Protocol { command: String, error: String },

    #[error("JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("page helper command '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// Query rejected by the page (e.g. selector syntax error)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The page helper is gone; no further call can succeed
    #[error("page session closed")]
    SessionClosed,
}

impl DriverError {
    /// Whether retrying against the same session is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::SessionClosed)
    }
}
