use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use element_cache::browser::driver::{DriverError, LiveQuery, PageDriver};
use element_cache::element::element_model::{ElementSet, LiveMatch};
use element_cache::element::locator::validation_selector;

/// Scripted page for driving the cache manager and resolver without a browser.
///
/// Selector lookups match any live record whose validation selector equals the
/// query, plus whatever is registered in `selectors`. Handle lookups use the
/// live set directly.
pub struct MockPage {
    pub url: String,
    pub live: ElementSet,
    pub selectors: HashMap<String, LiveMatch>,
    /// Page states to switch to, one per snapshot
    pub upcoming: VecDeque<ElementSet>,
    pub snapshot_error: Option<fn() -> DriverError>,
    pub lookup_error: Option<fn() -> DriverError>,
    pub snapshot_calls: usize,
    /// Every driver call in order: `snapshot` or the query description
    pub calls: Vec<String>,
}

impl MockPage {
    pub fn new(url: &str, live: ElementSet) -> Self {
        MockPage {
            url: url.to_string(),
            live,
            selectors: HashMap::new(),
            upcoming: VecDeque::new(),
            snapshot_error: None,
            lookup_error: None,
            snapshot_calls: 0,
            calls: Vec::new(),
        }
    }

    pub fn with_selector(mut self, selector: &str, handle: &str) -> Self {
        self.selectors.insert(
            selector.to_string(),
            LiveMatch {
                handle: handle.to_string(),
                visible: true,
                interactive: true,
            },
        );
        self
    }

    pub fn then_show(mut self, next: ElementSet) -> Self {
        self.upcoming.push_back(next);
        self
    }

    pub fn lookup_calls(&self) -> usize {
        self.calls.iter().filter(|c| *c != "snapshot").count()
    }

    pub fn reset_calls(&mut self) {
        self.snapshot_calls = 0;
        self.calls.clear();
    }
}

impl PageDriver for MockPage {
    fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.url.clone())
    }

    fn snapshot(&mut self, _timeout: Duration) -> Result<ElementSet, DriverError> {
        self.snapshot_calls += 1;
        self.calls.push("snapshot".to_string());

        if let Some(make_error) = self.snapshot_error {
            return Err(make_error());
        }
        if let Some(next) = self.upcoming.pop_front() {
            self.live = next;
        }
        Ok(self.live.clone())
    }

    fn live_lookup(
        &mut self,
        query: &LiveQuery,
        _timeout: Duration,
    ) -> Result<Option<LiveMatch>, DriverError> {
        self.calls.push(query.describe());

        if let Some(make_error) = self.lookup_error {
            return Err(make_error());
        }

        let found = match query {
            LiveQuery::Handle(handle) => self.live.get(handle).map(|record| LiveMatch {
                handle: handle.clone(),
                visible: !record.is_hidden(),
                interactive: record.is_interactive,
            }),
            LiveQuery::Selector(selector) => self.selectors.get(selector).cloned().or_else(|| {
                self.live
                    .iter_natural()
                    .into_iter()
                    .find(|(_, record)| validation_selector(record) == *selector)
                    .map(|(handle, record)| LiveMatch {
                        handle: handle.clone(),
                        visible: !record.is_hidden(),
                        interactive: record.is_interactive,
                    })
            }),
        };

        Ok(found)
    }
}
