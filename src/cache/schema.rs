use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::element_model::ElementSet;

/// Shared index file inside the cache directory.
pub const INDEX_FILE: &str = "metadata.json";

/// Extension of per-page record files.
pub const RECORD_EXTENSION: &str = "json";

/// One index entry, keyed in `CacheIndex` by the page's cache file key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Normalized page key (`url?sorted_params`)
    pub url: String,
    /// Unix seconds of the last store
    pub timestamp: f64,
    pub element_count: usize,
    pub version: u64,
}

pub type CacheIndex = BTreeMap<String, IndexRecord>;

/// Per-page durable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub metadata: PageRecordMetadata,
    pub elements: ElementSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecordMetadata {
    pub url: String,
    pub timestamp: f64,
    pub element_count: usize,
    /// Lets a lost index be rebuilt from the record itself
    #[serde(default)]
    pub version: u64,
}

/// Public view of an entry's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryMetadata {
    pub timestamp: f64,
    pub element_count: usize,
    pub version: u64,
}

impl From<&IndexRecord> for EntryMetadata {
    fn from(record: &IndexRecord) -> Self {
        EntryMetadata {
            timestamp: record.timestamp,
            element_count: record.element_count,
            version: record.version,
        }
    }
}
