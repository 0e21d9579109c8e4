use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::page::key::PageKey;

/// One cache or resolver decision, written as a JSONL line.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub page_key: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceEvent {
    pub fn now(page_key: &PageKey, event: &str) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            page_key: page_key.normalized(),
            event: event.to_string(),
            strategy: None,
            attempt: None,
            handle: None,
            version: None,
            detail: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl ToString) -> Self {
        self.strategy = Some(strategy.to_string());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_handle(mut self, handle: impl ToString) -> Self {
        self.handle = Some(handle.to_string());
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
