use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::browser::driver::{DriverError, LiveQuery, PageDriver};
use crate::browser::snapshot::RawSnapshot;
use crate::element::element_model::{ElementSet, LiveMatch};

/// Default location of the page helper script.
pub const DEFAULT_HELPER_SCRIPT: &str = "node/page-helper/page_server.js";

/// Extra time allowed on top of a command's own timeout for the helper to
/// serialize and flush its answer.
const RESPONSE_GRACE: Duration = Duration::from_millis(500);

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Request sent to the page helper over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BrowserRequest {
    Navigate {
        cmd: &'static str,
        id: u64,
        url: String,
    },
    Snapshot {
        cmd: &'static str,
        id: u64,
        timeout_ms: u64,
    },
    Lookup {
        cmd: &'static str,
        id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<String>,
        timeout_ms: u64,
    },
    CurrentUrl {
        cmd: &'static str,
        id: u64,
    },
    Quit {
        cmd: &'static str,
        id: u64,
    },
}

impl BrowserRequest {
    pub fn navigate(id: u64, url: &str) -> Self {
        BrowserRequest::Navigate {
            cmd: "navigate",
            id,
            url: url.to_string(),
        }
    }

    pub fn snapshot(id: u64, timeout_ms: u64) -> Self {
        BrowserRequest::Snapshot {
            cmd: "snapshot",
            id,
            timeout_ms,
        }
    }

    pub fn lookup(id: u64, query: &LiveQuery, timeout_ms: u64) -> Self {
        let (selector, handle) = match query {
            LiveQuery::Selector(s) => (Some(s.clone()), None),
            LiveQuery::Handle(h) => (None, Some(h.clone())),
        };
        BrowserRequest::Lookup {
            cmd: "lookup",
            id,
            selector,
            handle,
            timeout_ms,
        }
    }

    pub fn current_url(id: u64) -> Self {
        BrowserRequest::CurrentUrl {
            cmd: "current_url",
            id,
        }
    }

    pub fn quit(id: u64) -> Self {
        BrowserRequest::Quit { cmd: "quit", id }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            BrowserRequest::Navigate { cmd, .. }
            | BrowserRequest::Snapshot { cmd, .. }
            | BrowserRequest::Lookup { cmd, .. }
            | BrowserRequest::CurrentUrl { cmd, .. }
            | BrowserRequest::Quit { cmd, .. } => *cmd,
        }
    }
}

/// Response received from the page helper over stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct BrowserResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Set when the helper rejected the query itself (bad selector syntax)
    #[serde(default)]
    pub invalid: Option<bool>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub found: Option<LiveMatch>,
}

/// A persistent page session backed by a Node.js page helper.
///
/// The helper keeps a Chromium page open and answers NDJSON commands.
/// A reader thread forwards its stdout lines so that every request can be
/// bounded by a timeout; answers arriving after their request timed out are
/// recognized by id and discarded.
pub struct BrowserSession {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    next_id: u64,
    closed: bool,
}

impl BrowserSession {
    /// Launch the helper at its default location.
    pub fn launch() -> Result<Self, DriverError> {
        Self::launch_script(DEFAULT_HELPER_SCRIPT)
    }

    /// Launch a new session by spawning `node <script>` and waiting for its
    /// ready signal.
    pub fn launch_script(script: &str) -> Result<Self, DriverError> {
        let mut child = Command::new("node")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DriverError::Spawn {
                script: script.into(),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Io("failed to capture helper stdin".into()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Io("failed to capture helper stdout".into()))?;

        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut session = BrowserSession {
            child,
            stdin,
            lines,
            next_id: 1,
            closed: false,
        };

        let ready = session.read_response(None, "launch", LAUNCH_TIMEOUT)?;
        if !ready.ok || ready.ready != Some(true) {
            return Err(DriverError::Protocol {
                command: "launch".into(),
                error: "did not receive ready signal from page helper".into(),
            });
        }

        Ok(session)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Wait for the response matching `id` (or any response when `id` is
    /// `None`), skipping stale answers to earlier timed-out requests.
    fn read_response(
        &mut self,
        id: Option<u64>,
        command: &str,
        timeout: Duration,
    ) -> Result<BrowserResponse, DriverError> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.lines.recv_timeout(remaining) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DriverError::Timeout {
                        command: command.into(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.closed = true;
                    return Err(DriverError::SessionClosed);
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: BrowserResponse =
                serde_json::from_str(trimmed).map_err(|e| DriverError::Json {
                    context: format!("page helper response to {}", command),
                    source: e,
                })?;

            match (id, response.id) {
                (Some(expected), Some(got)) if expected != got => {
                    debug!(command, expected, got, "discarding stale page helper response");
                    continue;
                }
                _ => return Ok(response),
            }
        }
    }

    /// Send a request and read its response within `timeout`.
    fn send(
        &mut self,
        request: &BrowserRequest,
        id: u64,
        timeout: Duration,
    ) -> Result<BrowserResponse, DriverError> {
        if self.closed {
            return Err(DriverError::SessionClosed);
        }

        let json = serde_json::to_string(request).map_err(|e| DriverError::Json {
            context: "BrowserRequest".into(),
            source: e,
        })?;

        if writeln!(self.stdin, "{}", json)
            .and_then(|_| self.stdin.flush())
            .is_err()
        {
            self.closed = true;
            return Err(DriverError::SessionClosed);
        }

        self.read_response(Some(id), request.command_name(), timeout + RESPONSE_GRACE)
    }

    /// Send a request and verify it succeeded.
    fn send_ok(
        &mut self,
        request: &BrowserRequest,
        id: u64,
        timeout: Duration,
    ) -> Result<BrowserResponse, DriverError> {
        let response = self.send(request, id, timeout)?;
        if !response.ok {
            let error = response.error.unwrap_or_else(|| "unknown error".into());
            if response.invalid == Some(true) {
                return Err(DriverError::InvalidQuery(error));
            }
            return Err(DriverError::Protocol {
                command: request.command_name().into(),
                error,
            });
        }
        Ok(response)
    }

    /// Navigate to a URL.
    pub fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let id = self.allocate_id();
        let request = BrowserRequest::navigate(id, url);
        self.send_ok(&request, id, timeout)?;
        Ok(())
    }

    /// Quit the page helper.
    pub fn quit(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            let id = self.allocate_id();
            let request = BrowserRequest::quit(id);
            // Best-effort: the helper may already be gone
            let acknowledged = self.send(&request, id, Duration::from_secs(2)).is_ok();
            self.closed = true;
            if !acknowledged {
                let _ = self.child.kill();
            }
        }
        let _ = self.child.wait();
        Ok(())
    }
}

impl PageDriver for BrowserSession {
    fn current_url(&mut self) -> Result<String, DriverError> {
        let id = self.allocate_id();
        let request = BrowserRequest::current_url(id);
        let response = self.send_ok(&request, id, Duration::from_secs(5))?;
        let url = response.url.ok_or_else(|| DriverError::Protocol {
            command: "current_url".into(),
            error: "no url in response".into(),
        })?;
        Ok(url)
    }

    fn snapshot(&mut self, timeout: Duration) -> Result<ElementSet, DriverError> {
        let id = self.allocate_id();
        let request = BrowserRequest::snapshot(id, timeout.as_millis() as u64);
        let response = self.send_ok(&request, id, timeout)?;
        let data = response.data.ok_or_else(|| DriverError::Protocol {
            command: "snapshot".into(),
            error: "no data in snapshot response".into(),
        })?;

        let raw: RawSnapshot = serde_json::from_value(data).map_err(|e| DriverError::Json {
            context: "snapshot payload".into(),
            source: e,
        })?;

        let reported = raw.elements.len();
        let set = raw.into_element_set();
        if set.len() < reported {
            warn!(
                reported,
                kept = set.len(),
                "snapshot contained nodes without any locator"
            );
        }
        Ok(set)
    }

    fn live_lookup(
        &mut self,
        query: &LiveQuery,
        timeout: Duration,
    ) -> Result<Option<LiveMatch>, DriverError> {
        let id = self.allocate_id();
        let request = BrowserRequest::lookup(id, query, timeout.as_millis() as u64);
        let response = self.send_ok(&request, id, timeout)?;
        Ok(response.found)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}
