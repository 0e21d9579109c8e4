use std::time::Duration;

use tracing::{debug, info};

use crate::browser::driver::{LiveQuery, PageDriver};
use crate::element::element_model::{ElementHandle, ElementRecord, ElementSet};
use crate::element::locator::validation_selector;
use crate::page::key::PageKey;

pub const DEFAULT_SAMPLE_SIZE: usize = 3;
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Tolerance for comparing the validity ratio against the threshold, so a
/// ratio that is mathematically equal to it passes.
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub sampled: usize,
    pub valid: usize,
    pub ratio: f64,
    pub is_valid: bool,
}

/// Re-confirms a bounded sample of cached records against the live page.
#[derive(Debug, Clone)]
pub struct Validator {
    pub sample_size: usize,
    pub threshold: f64,
    /// Per-sample live lookup timeout
    pub timeout: Duration,
}

impl Validator {
    pub fn new(sample_size: usize, threshold: f64, timeout: Duration) -> Self {
        Validator {
            sample_size,
            threshold,
            timeout,
        }
    }

    /// First `sample_size` records in natural handle order, or all of them
    /// when the set is not larger than the sample.
    pub fn select_samples<'a>(
        &self,
        cached: &'a ElementSet,
    ) -> Vec<(&'a ElementHandle, &'a ElementRecord)> {
        let mut entries = cached.iter_natural();
        entries.truncate(self.sample_size.max(1));
        entries
    }

    /// Ratio of sampled records still present on the live page. Lookup errors
    /// count as invalid for that sample only.
    pub fn check<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        cached: &ElementSet,
    ) -> ValidationReport {
        let samples = self.select_samples(cached);
        let mut valid = 0;

        for (handle, record) in &samples {
            let selector = validation_selector(record);
            match driver.live_lookup(&LiveQuery::Selector(selector.clone()), self.timeout) {
                Ok(Some(_)) => valid += 1,
                Ok(None) => {
                    debug!(page_key = %key, handle = %handle, selector = %selector, "validation sample missing");
                }
                Err(e) => {
                    debug!(page_key = %key, handle = %handle, selector = %selector, error = %e, "validation sample lookup failed");
                }
            }
        }

        let sampled = samples.len();
        let ratio = if sampled == 0 {
            0.0
        } else {
            valid as f64 / sampled as f64
        };
        let is_valid = sampled > 0 && ratio + RATIO_EPSILON >= self.threshold;

        info!(
            page_key = %key,
            valid,
            sampled,
            ratio,
            is_valid,
            "cache validation"
        );

        ValidationReport {
            sampled,
            valid,
            ratio,
            is_valid,
        }
    }

    pub fn validate<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        cached: &ElementSet,
    ) -> bool {
        self.check(driver, key, cached).is_valid
    }
}

impl Default for Validator {
    fn default() -> Self {
        Validator::new(
            DEFAULT_SAMPLE_SIZE,
            DEFAULT_THRESHOLD,
            Duration::from_millis(2000),
        )
    }
}
