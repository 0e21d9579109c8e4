use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stable handle of an element within one page's element set.
pub type ElementHandle = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Id,
    Css,
    Xpath,
    Role,
    Name,
}

/// One typed way to re-find an element. Lower `priority` is preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    pub value: String,
    pub priority: u8,
}

impl Locator {
    pub fn new(kind: LocatorKind, value: impl Into<String>, priority: u8) -> Self {
        Locator {
            kind,
            value: value.into(),
            priority,
        }
    }
}

/// Cached description of one discovered UI element.
///
/// Snapshot adapters populate every field; nothing downstream probes for
/// optional capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub tag: String,
    pub locators: Vec<Locator>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    pub is_visible: bool,
    pub is_interactive: bool,
    #[serde(default)]
    pub last_seen_version: u64,
}

impl ElementRecord {
    /// Value of the first locator of the given kind.
    pub fn locator(&self, kind: LocatorKind) -> Option<&str> {
        self.locators
            .iter()
            .find(|l| l.kind == kind)
            .map(|l| l.value.as_str())
    }

    pub fn xpath(&self) -> Option<&str> {
        self.locator(LocatorKind::Xpath)
    }

    /// Most preferred non-empty locator.
    pub fn best_locator(&self) -> Option<&Locator> {
        self.locators
            .iter()
            .filter(|l| !l.value.is_empty())
            .min_by_key(|l| l.priority)
    }

    /// Non-empty attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// A record without a usable locator can never be re-found and is not stored.
    pub fn is_storable(&self) -> bool {
        self.locators.iter().any(|l| !l.value.trim().is_empty())
    }

    /// Hidden by the visibility flag, an inline `display:none` or
    /// `visibility:hidden` style, or a `hidden` attribute.
    pub fn is_hidden(&self) -> bool {
        if !self.is_visible {
            return true;
        }

        if let Some(style) = self.attributes.get("style") {
            let compact: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase();
            if compact.contains("display:none") || compact.contains("visibility:hidden") {
                return true;
            }
        }

        self.attributes.contains_key("hidden")
    }
}

/// Elements discovered on one page, keyed by handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementSet {
    elements: BTreeMap<ElementHandle, ElementRecord>,
}

impl ElementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record under the same handle.
    /// Returns `false` (and stores nothing) when the record has no usable locator.
    pub fn insert(&mut self, handle: impl Into<ElementHandle>, record: ElementRecord) -> bool {
        if !record.is_storable() {
            return false;
        }
        self.elements.insert(handle.into(), record);
        true
    }

    pub fn remove(&mut self, handle: &str) -> Option<ElementRecord> {
        self.elements.remove(handle)
    }

    pub fn get(&self, handle: &str) -> Option<&ElementRecord> {
        self.elements.get(handle)
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.elements.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = &ElementHandle> {
        self.elements.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementHandle, &ElementRecord)> {
        self.elements.iter()
    }

    /// Entries in natural handle order: numeric handles by value, then
    /// everything else lexicographically. This mirrors the order snapshot
    /// sources assign indices in.
    pub fn iter_natural(&self) -> Vec<(&ElementHandle, &ElementRecord)> {
        let mut entries: Vec<_> = self.elements.iter().collect();
        entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
        entries
    }

    /// Stamp every record as seen at `version`.
    pub fn mark_seen(&mut self, version: u64) {
        for record in self.elements.values_mut() {
            record.last_seen_version = version;
        }
    }

    /// Drop records that violate the storable-locator invariant (e.g. after
    /// loading a hand-edited file).
    pub fn retain_storable(&mut self) -> usize {
        let before = self.elements.len();
        self.elements.retain(|_, r| r.is_storable());
        before - self.elements.len()
    }
}

impl FromIterator<(ElementHandle, ElementRecord)> for ElementSet {
    fn from_iter<T: IntoIterator<Item = (ElementHandle, ElementRecord)>>(iter: T) -> Self {
        let mut set = ElementSet::new();
        for (handle, record) in iter {
            set.insert(handle, record);
        }
        set
    }
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Answer from a live lookup: which element matched and what the page
/// currently says about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMatch {
    pub handle: ElementHandle,
    pub visible: bool,
    pub interactive: bool,
}
