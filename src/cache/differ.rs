use std::collections::BTreeSet;
use std::time::Duration;

use tracing::info;

use crate::browser::driver::{DriverError, PageDriver};
use crate::element::element_model::{ElementHandle, ElementRecord, ElementSet};
use crate::page::key::PageKey;

/// Attributes whose change marks an element as modified.
pub const TRACKED_ATTRIBUTES: [&str; 4] = ["id", "class", "name", "type"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementDiff {
    pub added: BTreeSet<ElementHandle>,
    pub modified: BTreeSet<ElementHandle>,
    pub removed: BTreeSet<ElementHandle>,
}

impl ElementDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Which record fields count toward modification.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModificationPolicy {
    /// Also treat a change of visible text as a modification
    pub compare_text: bool,
}

pub fn is_element_modified(
    old: &ElementRecord,
    new: &ElementRecord,
    policy: ModificationPolicy,
) -> bool {
    if old.xpath() != new.xpath() || old.tag != new.tag || old.is_interactive != new.is_interactive
    {
        return true;
    }

    if TRACKED_ATTRIBUTES
        .iter()
        .any(|attr| old.attributes.get(*attr) != new.attributes.get(*attr))
    {
        return true;
    }

    policy.compare_text && old.text != new.text
}

pub fn compute_diff(
    cached: &ElementSet,
    fresh: &ElementSet,
    policy: ModificationPolicy,
) -> ElementDiff {
    let cached_keys: BTreeSet<_> = cached.handles().cloned().collect();
    let fresh_keys: BTreeSet<_> = fresh.handles().cloned().collect();

    let added = fresh_keys.difference(&cached_keys).cloned().collect();
    let removed = cached_keys.difference(&fresh_keys).cloned().collect();

    let modified = cached_keys
        .intersection(&fresh_keys)
        .filter(|handle| match (cached.get(handle), fresh.get(handle)) {
            (Some(old), Some(new)) => is_element_modified(old, new, policy),
            _ => false,
        })
        .cloned()
        .collect();

    ElementDiff {
        added,
        modified,
        removed,
    }
}

/// Start from `cached`, take `fresh` entries for added and modified handles,
/// drop removed ones. Unchanged entries keep their cached record.
pub fn merge(cached: &ElementSet, fresh: &ElementSet, diff: &ElementDiff) -> ElementSet {
    let mut merged = cached.clone();

    for handle in diff.added.iter().chain(diff.modified.iter()) {
        if let Some(record) = fresh.get(handle) {
            merged.insert(handle.clone(), record.clone());
        }
    }

    for handle in &diff.removed {
        merged.remove(handle);
    }

    merged
}

#[derive(Debug, Clone)]
pub struct DiffOutcome {
    pub merged: ElementSet,
    pub diff: ElementDiff,
}

/// Incremental updater: snapshot the live page and fold the differences into
/// a cached set.
#[derive(Debug, Clone, Default)]
pub struct Differ {
    pub policy: ModificationPolicy,
}

impl Differ {
    pub fn new(policy: ModificationPolicy) -> Self {
        Differ { policy }
    }

    pub fn apply(&self, cached: &ElementSet, fresh: &ElementSet) -> DiffOutcome {
        let diff = compute_diff(cached, fresh, self.policy);
        let merged = merge(cached, fresh, &diff);
        DiffOutcome { merged, diff }
    }

    pub fn update<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        cached: &ElementSet,
        timeout: Duration,
    ) -> Result<DiffOutcome, DriverError> {
        let fresh = driver.snapshot(timeout)?;
        let outcome = self.apply(cached, &fresh);

        info!(
            page_key = %key,
            added = outcome.diff.added.len(),
            modified = outcome.diff.modified.len(),
            removed = outcome.diff.removed.len(),
            "computed element diff"
        );

        Ok(outcome)
    }
}
