use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::browser::driver::{DriverError, PageDriver};
use crate::cache::differ::{Differ, ElementDiff, ModificationPolicy};
use crate::cache::freshness::FreshnessPolicy;
use crate::cache::store::ElementStore;
use crate::cache::validator::Validator;
use crate::cli::config::ElementCacheConfig;
use crate::element::element_model::ElementSet;
use crate::page::key::PageKey;
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

/// Where the elements returned by the manager came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheSource {
    /// Cached entry, fresh and validated
    Cached,
    /// Full snapshot replaced the entry
    Refreshed,
    /// Validation failed; live differences were merged in
    DiffMerged(ElementDiff),
    /// A required snapshot failed; whatever was cached is returned as-is
    Stale,
}

#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub elements: ElementSet,
    pub source: CacheSource,
    /// Entry version after the lookup (0 when nothing is stored)
    pub version: u64,
}

/// Decides when to trust, refresh or repair a page's cached element set.
///
/// The manager is the only writer of cache entries. Calls for the same page
/// key are serialized; calls for different keys proceed independently.
pub struct CacheManager {
    store: Arc<ElementStore>,
    freshness: FreshnessPolicy,
    validator: Validator,
    differ: Differ,
    snapshot_timeout: Duration,
    tracer: Arc<TraceLogger>,
    page_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CacheManager {
    pub fn new(
        store: Arc<ElementStore>,
        freshness: FreshnessPolicy,
        validator: Validator,
        differ: Differ,
        snapshot_timeout: Duration,
    ) -> Self {
        CacheManager {
            store,
            freshness,
            validator,
            differ,
            snapshot_timeout,
            tracer: Arc::new(TraceLogger::disabled()),
            page_locks: DashMap::new(),
        }
    }

    pub fn from_config(store: Arc<ElementStore>, config: &ElementCacheConfig) -> Self {
        CacheManager::new(
            store,
            FreshnessPolicy::new(config.ttl()),
            Validator::new(
                config.validation_sample_size,
                config.validation_threshold,
                config.validation_timeout(),
            ),
            Differ::new(ModificationPolicy {
                compare_text: config.compare_text,
            }),
            config.snapshot_timeout(),
        )
    }

    pub fn with_tracer(mut self, tracer: Arc<TraceLogger>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn tracer(&self) -> &Arc<TraceLogger> {
        &self.tracer
    }

    /// Elements for `key`, refreshed or repaired as needed.
    pub fn get_elements<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        force_refresh: bool,
    ) -> ElementSet {
        self.lookup(driver, key, force_refresh).elements
    }

    /// Elements for whatever page the driver currently shows.
    pub fn get_elements_for_current_page<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        force_refresh: bool,
    ) -> Result<(PageKey, ElementSet), DriverError> {
        let url = driver.current_url()?;
        let key = PageKey::from_url(&url);
        let elements = self.get_elements(driver, &key, force_refresh);
        Ok((key, elements))
    }

    /// TTL expiry forces a full snapshot; within TTL a sampled validation
    /// decides between returning the cache and diff-merging the live page.
    pub fn lookup<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        force_refresh: bool,
    ) -> CacheLookup {
        let lock = self.page_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if force_refresh || self.freshness.should_refresh(&self.store, key) {
            let reason = if force_refresh { "forced" } else { "expired" };
            return self.full_refresh(driver, key, reason);
        }

        let cached = self.store.get(key);
        if cached.is_empty() {
            return self.full_refresh(driver, key, "empty");
        }

        let report = self.validator.check(driver, key, &cached);
        if report.is_valid {
            let version = self.current_version(key);
            info!(page_key = %key, count = cached.len(), "using cached elements");
            self.tracer.log(
                &TraceEvent::now(key, "cache_hit")
                    .with_version(version)
                    .with_detail(format!("{}/{} samples valid", report.valid, report.sampled)),
            );
            return CacheLookup {
                elements: cached,
                source: CacheSource::Cached,
                version,
            };
        }

        match self.differ.update(driver, key, &cached, self.snapshot_timeout) {
            Ok(outcome) => {
                let mut merged = outcome.merged;
                let next = self.current_version(key) + 1;
                merged.mark_seen(next);
                let metadata = self.store.put(key, merged.clone());

                self.tracer.log(
                    &TraceEvent::now(key, "diff_merged")
                        .with_version(metadata.version)
                        .with_detail(format!(
                            "added {}, modified {}, removed {}",
                            outcome.diff.added.len(),
                            outcome.diff.modified.len(),
                            outcome.diff.removed.len()
                        )),
                );

                CacheLookup {
                    elements: merged,
                    source: CacheSource::DiffMerged(outcome.diff),
                    version: metadata.version,
                }
            }
            Err(e) => {
                warn!(page_key = %key, error = %e, "snapshot for diff update failed, returning cached elements");
                self.stale(key, cached, &e)
            }
        }
    }

    /// Cached elements without touching the live page. Never writes.
    pub fn cached_elements(&self, key: &PageKey) -> ElementSet {
        self.store.get(key)
    }

    /// Drop one page's entry, or every entry.
    pub fn invalidate(&self, key: Option<&PageKey>) {
        match key {
            Some(key) => {
                let lock = self.page_lock(key);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.store.clear(Some(key));
            }
            None => self.store.clear(None),
        }
    }

    fn full_refresh<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        reason: &str,
    ) -> CacheLookup {
        info!(page_key = %key, reason, "refreshing element cache");

        match driver.snapshot(self.snapshot_timeout) {
            Ok(mut fresh) => {
                let next = self.current_version(key) + 1;
                fresh.mark_seen(next);
                let metadata = self.store.put(key, fresh.clone());

                self.tracer.log(
                    &TraceEvent::now(key, "refresh")
                        .with_version(metadata.version)
                        .with_detail(reason),
                );

                CacheLookup {
                    elements: fresh,
                    source: CacheSource::Refreshed,
                    version: metadata.version,
                }
            }
            Err(e) => {
                warn!(page_key = %key, reason, error = %e, "snapshot failed, falling back to cached elements");
                let cached = self.store.get(key);
                self.stale(key, cached, &e)
            }
        }
    }

    fn stale(&self, key: &PageKey, elements: ElementSet, error: &DriverError) -> CacheLookup {
        self.tracer.log(
            &TraceEvent::now(key, "snapshot_failed").with_detail(error),
        );
        CacheLookup {
            elements,
            source: CacheSource::Stale,
            version: self.current_version(key),
        }
    }

    fn current_version(&self, key: &PageKey) -> u64 {
        self.store.metadata(key).map_or(0, |m| m.version)
    }

    fn page_lock(&self, key: &PageKey) -> Arc<Mutex<()>> {
        self.page_locks
            .entry(key.normalized())
            .or_default()
            .value()
            .clone()
    }
}
