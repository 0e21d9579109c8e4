use std::collections::BTreeMap;

use crate::element::element_model::{ElementRecord, Locator, LocatorKind};

pub const ID_PRIORITY: u8 = 1;
pub const CSS_PRIORITY: u8 = 2;
pub const ROLE_PRIORITY: u8 = 3;
pub const NAME_PRIORITY: u8 = 4;
pub const XPATH_PRIORITY: u8 = 5;

/// Attributes that make a synthesized selector specific, in the order they
/// are appended.
const SELECTOR_ATTRIBUTES: [&str; 4] = ["name", "type", "role", "aria-label"];

/// Derive every usable locator for a node, sorted by priority.
pub fn derive_locators(
    tag: &str,
    xpath: Option<&str>,
    attributes: &BTreeMap<String, String>,
) -> Vec<Locator> {
    let non_empty = |name: &str| {
        attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let mut locators = Vec::new();

    if let Some(id) = non_empty("id") {
        locators.push(Locator::new(LocatorKind::Id, id, ID_PRIORITY));
    }

    if let Some(class) = non_empty("class") {
        locators.push(Locator::new(
            LocatorKind::Css,
            class_selector(tag, class),
            CSS_PRIORITY,
        ));
    }

    if let Some(role) = non_empty("role") {
        locators.push(Locator::new(LocatorKind::Role, role, ROLE_PRIORITY));
    }

    if let Some(name) = non_empty("name") {
        locators.push(Locator::new(LocatorKind::Name, name, NAME_PRIORITY));
    }

    if let Some(xpath) = xpath.map(str::trim).filter(|x| !x.is_empty()) {
        locators.push(Locator::new(LocatorKind::Xpath, xpath, XPATH_PRIORITY));
    }

    locators.sort_by_key(|l| l.priority);
    locators
}

/// `tag.class1.class2` for a whitespace-separated class list.
pub fn class_selector(tag: &str, class: &str) -> String {
    let classes: Vec<&str> = class.split_whitespace().collect();
    format!("{}.{}", tag, classes.join("."))
}

/// CSS selector used to re-confirm a cached record on the live page.
///
/// `#id` when the record has an id locator, otherwise
/// `tag[name="…"][type="…"][role="…"][aria-label="…"].firstClass` using only
/// the attributes that are present.
pub fn validation_selector(record: &ElementRecord) -> String {
    if let Some(id) = record.locator(LocatorKind::Id).filter(|v| !v.is_empty()) {
        return id_selector(id);
    }

    let mut selector = if record.tag.is_empty() {
        "*".to_string()
    } else {
        record.tag.to_lowercase()
    };

    for attr in SELECTOR_ATTRIBUTES {
        if let Some(value) = record.attribute(attr) {
            selector.push_str(&format!("[{}=\"{}\"]", attr, escape_attribute(value)));
        }
    }

    if let Some(first) = record
        .attribute("class")
        .and_then(|c| c.split_whitespace().next())
    {
        selector.push('.');
        selector.push_str(first);
    }

    selector
}

fn id_selector(id: &str) -> String {
    let simple = id
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '-')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if simple {
        format!("#{}", id)
    } else {
        format!("[id=\"{}\"]", escape_attribute(id))
    }
}

fn escape_attribute(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
