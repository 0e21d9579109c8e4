use std::time::Duration;

use element_cache::browser::driver::DriverError;
use element_cache::cache::validator::Validator;
use element_cache::element::element_model::ElementSet;
use element_cache::page::key::PageKey;

use crate::common::mock_page::MockPage;
use crate::common::records::{button, numbered_buttons, set_of};

mod common;

fn validator(sample_size: usize) -> Validator {
    Validator::new(sample_size, 0.7, Duration::from_millis(50))
}

fn page_key() -> PageKey {
    PageKey::from_url("https://x.test/")
}

/// A live page holding only the listed handles from `cached`.
fn page_with(cached: &ElementSet, keep: &[&str]) -> MockPage {
    let live = cached
        .iter()
        .filter(|(h, _)| keep.contains(&h.as_str()))
        .map(|(h, r)| (h.clone(), r.clone()))
        .collect();
    MockPage::new("https://x.test/", live)
}

// =========================================================================
// Threshold
// =========================================================================

#[test]
fn two_of_three_is_below_threshold() {
    let cached = numbered_buttons(3);
    let mut page = page_with(&cached, &["1", "2"]);

    let report = validator(3).check(&mut page, &page_key(), &cached);
    assert_eq!(report.sampled, 3);
    assert_eq!(report.valid, 2);
    assert!(!report.is_valid);
}

#[test]
fn three_of_three_is_valid() {
    let cached = numbered_buttons(3);
    let mut page = page_with(&cached, &["1", "2", "3"]);

    assert!(validator(3).validate(&mut page, &page_key(), &cached));
}

#[test]
fn ratio_equal_to_threshold_is_valid() {
    let cached = numbered_buttons(10);
    let mut page = page_with(&cached, &["1", "2", "3", "4", "5", "6", "7"]);

    let report = validator(10).check(&mut page, &page_key(), &cached);
    assert_eq!(report.valid, 7);
    assert!((report.ratio - 0.7).abs() < 1e-12);
    assert!(report.is_valid, "7/10 meets a 0.7 threshold");
}

#[test]
fn empty_set_is_never_valid() {
    let cached = numbered_buttons(0);
    let mut page = MockPage::new("https://x.test/", cached.clone());

    let report = validator(3).check(&mut page, &page_key(), &cached);
    assert_eq!(report.sampled, 0);
    assert!(!report.is_valid);
    assert!(page.calls.is_empty());
}

// =========================================================================
// Sampling
// =========================================================================

#[test]
fn samples_first_handles_in_natural_order() {
    let cached = numbered_buttons(12);
    let samples: Vec<&str> = validator(3)
        .select_samples(&cached)
        .into_iter()
        .map(|(h, _)| h.as_str())
        .collect();

    assert_eq!(samples, vec!["1", "2", "3"]);
}

#[test]
fn small_set_samples_everything() {
    let cached = numbered_buttons(2);
    let mut page = page_with(&cached, &["1", "2"]);

    let report = validator(5).check(&mut page, &page_key(), &cached);
    assert_eq!(report.sampled, 2);
    assert!(report.is_valid);
}

#[test]
fn only_samples_are_looked_up() {
    let cached = numbered_buttons(8);
    let mut page = page_with(&cached, &["1", "2", "3"]);

    assert!(validator(3).validate(&mut page, &page_key(), &cached));
    assert_eq!(page.lookup_calls(), 3);
    assert_eq!(page.snapshot_calls, 0);
}

// =========================================================================
// Lookup failures
// =========================================================================

#[test]
fn lookup_errors_count_as_invalid_samples() {
    let cached = numbered_buttons(3);
    let mut page = page_with(&cached, &["1", "2", "3"]);
    page.lookup_error = Some(|| DriverError::Timeout {
        command: "lookup".into(),
        timeout_ms: 50,
    });

    let report = validator(3).check(&mut page, &page_key(), &cached);
    assert_eq!(report.sampled, 3, "every sample still attempted");
    assert_eq!(report.valid, 0);
    assert!(!report.is_valid);
}

#[test]
fn validation_uses_id_selector() {
    let cached = set_of(vec![("1", button("checkout", "Checkout"))]);
    let mut page = page_with(&cached, &["1"]);

    validator(3).check(&mut page, &page_key(), &cached);
    assert_eq!(page.calls, vec!["selector #checkout".to_string()]);
}
