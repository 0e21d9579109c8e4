use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::cache::error::StoreError;
use crate::cache::freshness::unix_now;
use crate::cache::schema::{
    CacheIndex, EntryMetadata, INDEX_FILE, IndexRecord, PageRecord, PageRecordMetadata,
    RECORD_EXTENSION,
};
use crate::element::element_model::ElementSet;
use crate::page::key::PageKey;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// In-memory index plus a counter bumped on every change, so snapshots
/// persisted outside the lock are never written out of order.
#[derive(Default)]
struct IndexState {
    /// Keyed by cache file key
    entries: CacheIndex,
    generation: u64,
}

/// Two-tier element store: an in-memory hot tier in front of one JSON file
/// per page plus a shared index.
///
/// The store is best-effort. Durable-tier failures are logged and the call
/// continues memory-only; unreadable records are treated as absent and
/// removed so they get rebuilt.
pub struct ElementStore {
    cache_dir: PathBuf,
    durable: bool,
    /// Hot tier, keyed by normalized page key
    memory: DashMap<String, ElementSet>,
    index: Mutex<IndexState>,
    /// Generation of the last index snapshot written to disk
    index_written: Mutex<u64>,
    /// Serializes writes (and durable loads) per normalized page key
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ElementStore {
    /// Open (creating if needed) a store rooted at `cache_dir`.
    pub fn open(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();

        let durable = match fs::create_dir_all(&cache_dir) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    dir = %cache_dir.display(),
                    error = %e,
                    "cache directory unavailable, running memory-only"
                );
                false
            }
        };

        let index = if durable {
            load_index(&cache_dir)
        } else {
            CacheIndex::new()
        };

        info!(
            dir = %cache_dir.display(),
            entries = index.len(),
            "element store opened"
        );

        ElementStore {
            cache_dir,
            durable,
            memory: DashMap::new(),
            index: Mutex::new(IndexState {
                entries: index,
                generation: 0,
            }),
            index_written: Mutex::new(0),
            key_locks: DashMap::new(),
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        ElementStore {
            cache_dir: PathBuf::new(),
            durable: false,
            memory: DashMap::new(),
            index: Mutex::new(IndexState::default()),
            index_written: Mutex::new(0),
            key_locks: DashMap::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Elements for `key`: memory first, then the durable record. Missing or
    /// unreadable entries yield an empty set.
    pub fn get(&self, key: &PageKey) -> ElementSet {
        let normalized = key.normalized();

        if let Some(set) = self.memory_get(&normalized) {
            debug!(page_key = %normalized, count = set.len(), "memory tier hit");
            return set;
        }

        if !self.durable {
            return ElementSet::new();
        }

        let lock = self.key_lock(&normalized);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // A writer may have filled the hot tier while we waited
        if let Some(set) = self.memory_get(&normalized) {
            return set;
        }

        match self.load_record(key) {
            Ok(Some(record)) => {
                let mut elements = record.elements;
                let dropped = elements.retain_storable();
                if dropped > 0 {
                    warn!(page_key = %normalized, dropped, "dropped cached records without locators");
                }

                self.restore_index_entry(key, &record.metadata, elements.len());
                self.memory.insert(normalized.clone(), elements.clone());

                info!(page_key = %normalized, count = elements.len(), "loaded elements from durable tier");
                elements
            }
            Ok(None) => ElementSet::new(),
            Err(e) => {
                warn!(page_key = %normalized, error = %e, "discarding unreadable cache record");
                self.discard_durable(key);
                ElementSet::new()
            }
        }
    }

    /// Replace the entry for `key`, stamping it with the current time and the
    /// next version.
    pub fn put(&self, key: &PageKey, elements: ElementSet) -> EntryMetadata {
        let normalized = key.normalized();
        let file_key = key.cache_file_key();

        let lock = self.key_lock(&normalized);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let timestamp = unix_now();
        let version = self
            .lock_index()
            .entries
            .get(&file_key)
            .map_or(0, |r| r.version)
            + 1;
        let element_count = elements.len();

        if self.durable {
            let record = PageRecord {
                metadata: PageRecordMetadata {
                    url: normalized.clone(),
                    timestamp,
                    element_count,
                    version,
                },
                elements: elements.clone(),
            };
            if let Err(e) = self.write_record(&file_key, &record) {
                // The index keeps describing whatever record is on disk
                warn!(page_key = %normalized, error = %e, "failed to persist elements, keeping memory only");
                self.memory.insert(normalized.clone(), elements);
                return EntryMetadata {
                    timestamp,
                    element_count,
                    version,
                };
            }
        }

        self.memory.insert(normalized.clone(), elements);

        let entry = IndexRecord {
            url: normalized.clone(),
            timestamp,
            element_count,
            version,
        };
        if let Some(snapshot) = self.modify_index(|index| {
            index.insert(file_key, entry);
            true
        }) {
            self.persist_index(snapshot);
        }

        info!(page_key = %normalized, count = element_count, version, "stored elements");

        EntryMetadata {
            timestamp,
            element_count,
            version,
        }
    }

    pub fn metadata(&self, key: &PageKey) -> Option<EntryMetadata> {
        self.lock_index()
            .entries
            .get(&key.cache_file_key())
            .map(EntryMetadata::from)
    }

    /// Remove one entry, or every entry when `key` is `None`, from both tiers.
    pub fn clear(&self, key: Option<&PageKey>) {
        match key {
            Some(key) => {
                let normalized = key.normalized();
                let lock = self.key_lock(&normalized);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

                self.memory.remove(&normalized);
                self.discard_durable(key);
                info!(page_key = %normalized, "cleared cache entry");
            }
            None => {
                self.memory.clear();
                if let Some(snapshot) = self.modify_index(|index| {
                    index.clear();
                    true
                }) {
                    self.persist_index(snapshot);
                }
                if self.durable {
                    self.remove_record_files();
                }
                info!("cleared all cache entries");
            }
        }
    }

    /// Every URL present in the index.
    pub fn cached_urls(&self) -> Vec<String> {
        self.lock_index()
            .entries
            .values()
            .map(|r| r.url.clone())
            .collect()
    }

    /// Copy of the index, keyed by cache file key.
    pub fn entries(&self) -> Vec<(String, IndexRecord)> {
        self.lock_index()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn memory_get(&self, normalized: &str) -> Option<ElementSet> {
        self.memory.get(normalized).map(|set| set.value().clone())
    }

    fn key_lock(&self, normalized: &str) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(normalized.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn lock_index(&self) -> MutexGuard<'_, IndexState> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` under the index lock. When it reports a change, returns
    /// the new generation and a copy of the index for `persist_index`.
    fn modify_index(
        &self,
        change: impl FnOnce(&mut CacheIndex) -> bool,
    ) -> Option<(u64, CacheIndex)> {
        let mut state = self.lock_index();
        if !change(&mut state.entries) {
            return None;
        }
        state.generation += 1;
        Some((state.generation, state.entries.clone()))
    }

    /// Write an index copy taken by `modify_index`, unless a newer one has
    /// already been written.
    fn persist_index(&self, (generation, entries): (u64, CacheIndex)) {
        if !self.durable {
            return;
        }

        let mut written = self
            .index_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generation <= *written {
            debug!(generation, written = *written, "skipping superseded index write");
            return;
        }

        match self.write_index(&entries) {
            Ok(()) => *written = generation,
            Err(e) => warn!(error = %e, "failed to persist cache index"),
        }
    }

    fn record_path(&self, file_key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", file_key, RECORD_EXTENSION))
    }

    fn load_record(&self, key: &PageKey) -> Result<Option<PageRecord>, StoreError> {
        let path = self.record_path(&key.cache_file_key());
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let record: PageRecord =
            serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Some(record))
    }

    fn write_record(&self, file_key: &str, record: &PageRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&self.record_path(file_key), json.as_bytes())
    }

    fn write_index(&self, index: &CacheIndex) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(index)?;
        write_atomic(&self.cache_dir.join(INDEX_FILE), json.as_bytes())
    }

    /// Re-create an index entry from a record's own metadata when the index
    /// lost track of it.
    fn restore_index_entry(&self, key: &PageKey, metadata: &PageRecordMetadata, count: usize) {
        let file_key = key.cache_file_key();
        let entry = IndexRecord {
            url: key.normalized(),
            timestamp: metadata.timestamp,
            element_count: count,
            version: metadata.version,
        };

        if let Some(snapshot) = self.modify_index(|index| {
            if index.contains_key(&file_key) {
                return false;
            }
            index.insert(file_key.clone(), entry);
            true
        }) {
            info!(page_key = %key, "restored lost index entry");
            self.persist_index(snapshot);
        }
    }

    /// Drop the index entry and record file for `key`.
    fn discard_durable(&self, key: &PageKey) {
        let file_key = key.cache_file_key();

        if let Some(snapshot) = self.modify_index(|index| index.remove(&file_key).is_some()) {
            self.persist_index(snapshot);
        }

        if !self.durable {
            return;
        }

        let path = self.record_path(&file_key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove cache record"),
        }
    }

    fn remove_record_files(&self) {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.cache_dir.display(), error = %e, "failed to list cache directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let is_record = name.ends_with(&format!(".{}", RECORD_EXTENSION)) && name != INDEX_FILE;
            let is_temp = name.ends_with(".tmp");
            if !(is_record || is_temp) {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove cache file");
            }
        }
    }
}

fn load_index(cache_dir: &Path) -> CacheIndex {
    let path = cache_dir.join(INDEX_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheIndex::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache index");
            return CacheIndex::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(index) => index,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cache index is malformed, starting empty");
            CacheIndex::new()
        }
    }
}

/// Write to a unique sibling temp file, then rename over the target so
/// readers see either the old file or the new one.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp_path, contents)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}
