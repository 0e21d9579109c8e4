use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cache::schema::EntryMetadata;
use crate::cache::store::ElementStore;
use crate::page::key::PageKey;

pub const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessDecision {
    Fresh,
    Expired,
    Absent,
}

/// Age-based trust decision for a cache entry.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    pub ttl: Duration,
}

impl FreshnessPolicy {
    pub fn new(ttl: Duration) -> Self {
        FreshnessPolicy { ttl }
    }

    pub fn decide(&self, metadata: Option<&EntryMetadata>, now: f64) -> FreshnessDecision {
        match metadata {
            None => FreshnessDecision::Absent,
            Some(meta) if now - meta.timestamp > self.ttl.as_secs_f64() => {
                FreshnessDecision::Expired
            }
            Some(_) => FreshnessDecision::Fresh,
        }
    }

    pub fn should_refresh(&self, store: &ElementStore, key: &PageKey) -> bool {
        self.decide(store.metadata(key).as_ref(), unix_now()) != FreshnessDecision::Fresh
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        FreshnessPolicy::new(Duration::from_secs(DEFAULT_TTL_SECONDS))
    }
}

/// Current time as fractional unix seconds.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
