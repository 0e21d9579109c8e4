use std::collections::BTreeMap;

use serde::Deserialize;

use crate::element::element_model::{ElementRecord, ElementSet};
use crate::element::locator::derive_locators;

/// One node as reported by the page helper's snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDomNode {
    #[serde(rename = "tagName")]
    pub tag_name: String,
    #[serde(default)]
    pub xpath: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "isVisible", default = "default_true")]
    pub is_visible: bool,
    #[serde(rename = "isInteractive", default)]
    pub is_interactive: bool,
}

fn default_true() -> bool {
    true
}

/// Snapshot payload: `{ "url": …, "elements": { handle: RawDomNode } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub elements: BTreeMap<String, RawDomNode>,
}

impl RawDomNode {
    /// Convert into a fully populated record, or `None` when the node offers
    /// no locator at all.
    pub fn into_record(self) -> Option<ElementRecord> {
        let tag = self.tag_name.to_lowercase();
        let locators = derive_locators(&tag, self.xpath.as_deref(), &self.attributes);

        let record = ElementRecord {
            tag,
            locators,
            attributes: self.attributes,
            text: self.text.unwrap_or_default(),
            is_visible: self.is_visible,
            is_interactive: self.is_interactive,
            last_seen_version: 0,
        };

        record.is_storable().then_some(record)
    }
}

impl RawSnapshot {
    pub fn into_element_set(self) -> ElementSet {
        self.elements
            .into_iter()
            .filter_map(|(handle, node)| node.into_record().map(|r| (handle, r)))
            .collect()
    }
}
