use std::collections::BTreeMap;

use element_cache::browser::snapshot::RawSnapshot;
use element_cache::element::element_model::{ElementRecord, ElementSet, LocatorKind};
use element_cache::element::locator::{
    CSS_PRIORITY, ID_PRIORITY, XPATH_PRIORITY, class_selector, derive_locators,
    validation_selector,
};

use crate::common::records::{button, element, hidden, plain_div, set_of};

mod common;

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =========================================================================
// Locator derivation
// =========================================================================

#[test]
fn derive_locators_sorted_by_priority() {
    let locators = derive_locators(
        "input",
        Some("/html/body/form/input[2]"),
        &attrs(&[
            ("id", "email"),
            ("class", "field wide"),
            ("role", "textbox"),
            ("name", "email"),
        ]),
    );

    let kinds: Vec<LocatorKind> = locators.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LocatorKind::Id,
            LocatorKind::Css,
            LocatorKind::Role,
            LocatorKind::Name,
            LocatorKind::Xpath,
        ]
    );
    assert_eq!(locators[0].priority, ID_PRIORITY);
    assert_eq!(locators[1].value, "input.field.wide");
    assert_eq!(locators[1].priority, CSS_PRIORITY);
    assert_eq!(locators[4].priority, XPATH_PRIORITY);
}

#[test]
fn derive_locators_ignores_blank_attributes() {
    let locators = derive_locators("div", None, &attrs(&[("id", "  "), ("class", "")]));
    assert!(locators.is_empty());
}

#[test]
fn class_selector_collapses_whitespace() {
    assert_eq!(class_selector("a", "  nav   link "), "a.nav.link");
}

#[test]
fn best_locator_prefers_lowest_priority() {
    let record = element(
        "a",
        "/html/body/a",
        &[("class", "nav"), ("name", "home")],
        "Home",
    );
    let best = record.best_locator().expect("has locators");
    assert_eq!(best.kind, LocatorKind::Css);
}

// =========================================================================
// Validation selectors
// =========================================================================

#[test]
fn validation_selector_uses_simple_id() {
    assert_eq!(validation_selector(&button("submit-btn", "Go")), "#submit-btn");
}

#[test]
fn validation_selector_quotes_awkward_id() {
    let record = element("div", "/html/body/div", &[("id", "1st.item")], "");
    assert_eq!(validation_selector(&record), "[id=\"1st.item\"]");
}

#[test]
fn validation_selector_synthesizes_from_attributes() {
    let record = element(
        "input",
        "/html/body/form/input",
        &[
            ("name", "q"),
            ("type", "search"),
            ("aria-label", "Search \"all\""),
            ("class", "big rounded"),
        ],
        "",
    );

    assert_eq!(
        validation_selector(&record),
        r#"input[name="q"][type="search"][aria-label="Search \"all\""].big"#
    );
}

#[test]
fn validation_selector_falls_back_to_tag() {
    assert_eq!(validation_selector(&plain_div("/html/body/div[3]", "x")), "div");
}

// =========================================================================
// Records and sets
// =========================================================================

#[test]
fn record_without_locators_is_not_stored() {
    let mut set = ElementSet::new();
    let bare = ElementRecord {
        tag: "span".into(),
        locators: Vec::new(),
        attributes: BTreeMap::new(),
        text: "orphan".into(),
        is_visible: true,
        is_interactive: false,
        last_seen_version: 0,
    };

    assert!(!set.insert("1", bare));
    assert!(set.is_empty());
    assert!(set.insert("2", button("ok", "OK")));
    assert_eq!(set.len(), 1);
}

#[test]
fn hidden_detection() {
    assert!(hidden(button("a", "A")).is_hidden(), "visibility flag");

    let styled = element("div", "/d", &[("style", "color: red; display : none")], "");
    assert!(styled.is_hidden(), "inline display:none");

    let invisible = element("div", "/d", &[("style", "visibility:hidden")], "");
    assert!(invisible.is_hidden(), "inline visibility:hidden");

    let attr = element("div", "/d", &[("hidden", "")], "");
    assert!(attr.is_hidden(), "hidden attribute");

    assert!(!button("b", "B").is_hidden());
}

#[test]
fn natural_order_puts_numbers_first_by_value() {
    let set = set_of(vec![
        ("10", button("a", "A")),
        ("2", button("b", "B")),
        ("x", button("c", "C")),
        ("1", button("d", "D")),
    ]);

    let order: Vec<&str> = set
        .iter_natural()
        .into_iter()
        .map(|(h, _)| h.as_str())
        .collect();
    assert_eq!(order, vec!["1", "2", "10", "x"]);
}

#[test]
fn mark_seen_stamps_every_record() {
    let mut set = set_of(vec![("1", button("a", "A")), ("2", button("b", "B"))]);
    set.mark_seen(7);
    assert!(set.iter().all(|(_, r)| r.last_seen_version == 7));
}

#[test]
fn element_set_serializes_as_handle_map() {
    let set = set_of(vec![("3", button("go", "Go"))]);
    let json = serde_json::to_value(&set).unwrap();

    assert!(json.get("3").is_some(), "transparent map keyed by handle");
    assert_eq!(json["3"]["tag"], "button");
    assert_eq!(json["3"]["locators"][0]["kind"], "id");
}

// =========================================================================
// Snapshot payload conversion
// =========================================================================

#[test]
fn raw_snapshot_converts_and_drops_unlocatable_nodes() {
    let payload = r#"{
        "url": "https://x.test/",
        "elements": {
            "1": {
                "tagName": "BUTTON",
                "xpath": "/html/body/button",
                "attributes": { "id": "save", "class": "primary" },
                "text": "Save",
                "isInteractive": true
            },
            "2": { "tagName": "SPAN", "attributes": {}, "text": "no locator" },
            "3": {
                "tagName": "A",
                "xpath": "/html/body/a",
                "attributes": { "href": "/x" },
                "isVisible": false
            }
        }
    }"#;

    let snapshot: RawSnapshot = serde_json::from_str(payload).unwrap();
    let set = snapshot.into_element_set();

    assert_eq!(set.len(), 2);
    assert!(!set.contains("2"));

    let save = set.get("1").unwrap();
    assert_eq!(save.tag, "button");
    assert_eq!(save.locator(LocatorKind::Id), Some("save"));
    assert_eq!(save.locator(LocatorKind::Css), Some("button.primary"));
    assert!(save.is_visible, "visibility defaults to true");
    assert!(save.is_interactive);

    let link = set.get("3").unwrap();
    assert_eq!(link.xpath(), Some("/html/body/a"));
    assert!(link.is_hidden());
    assert_eq!(link.text, "");
}
