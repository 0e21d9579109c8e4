use std::collections::BTreeMap;

use element_cache::element::element_model::{ElementRecord, ElementSet};
use element_cache::element::locator::derive_locators;

const INTERACTIVE_TAGS: [&str; 5] = ["a", "button", "input", "select", "textarea"];

/// Fully populated record with locators derived from `attrs` and `xpath`.
pub fn element(tag: &str, xpath: &str, attrs: &[(&str, &str)], text: &str) -> ElementRecord {
    let attributes: BTreeMap<String, String> = attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    ElementRecord {
        tag: tag.to_string(),
        locators: derive_locators(tag, Some(xpath), &attributes),
        attributes,
        text: text.to_string(),
        is_visible: true,
        is_interactive: INTERACTIVE_TAGS.contains(&tag),
        last_seen_version: 0,
    }
}

pub fn button(id: &str, text: &str) -> ElementRecord {
    element(
        "button",
        &format!("//button[@id='{}']", id),
        &[("id", id)],
        text,
    )
}

/// A `<div>` only reachable through its xpath.
pub fn plain_div(xpath: &str, text: &str) -> ElementRecord {
    element("div", xpath, &[], text)
}

pub fn hidden(mut record: ElementRecord) -> ElementRecord {
    record.is_visible = false;
    record
}

pub fn set_of(items: Vec<(&str, ElementRecord)>) -> ElementSet {
    items
        .into_iter()
        .map(|(handle, record)| (handle.to_string(), record))
        .collect()
}

/// Handles `1..=n`, each a button with id `btn-<n>`.
pub fn numbered_buttons(n: usize) -> ElementSet {
    (1..=n)
        .map(|i| {
            (
                i.to_string(),
                button(&format!("btn-{}", i), &format!("Button {}", i)),
            )
        })
        .collect()
}
