use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::driver::{DriverError, LiveQuery, PageDriver};
use crate::cache::manager::CacheManager;
use crate::cli::config::ElementCacheConfig;
use crate::element::element_model::{ElementHandle, ElementSet, LiveMatch};
use crate::page::key::PageKey;
use crate::resolver::description::ElementDescription;
use crate::resolver::strategy::{
    StrategyKind, StrategyOutcome, live_match_acceptable, plan, record_matches,
};
use crate::trace::trace::TraceEvent;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub round: u32,
    pub strategy: StrategyKind,
    pub found: bool,
}

/// A successfully resolved element.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub handle: ElementHandle,
    pub strategy: StrategyKind,
    pub round: u32,
    /// Every strategy attempt made, in order, including the successful one
    pub attempts: Vec<StrategyAttempt>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("description has nothing to resolve by: {0}")]
    EmptyDescription(String),

    #[error("element not found ({description}) after {rounds} rounds and {attempts} strategy attempts")]
    NotFound {
        description: String,
        rounds: u32,
        attempts: usize,
    },

    #[error("page session lost while resolving {description}: {source}")]
    SessionLost {
        description: String,
        #[source]
        source: DriverError,
    },
}

/// Live page view shared by the scanning strategies of one round.
enum LiveView {
    NotTaken,
    Taken(ElementSet),
    Failed(String),
}

/// Turns an `ElementDescription` into a currently valid element handle,
/// retrying the ordered strategy list across rounds.
pub struct Resolver {
    manager: Arc<CacheManager>,
    max_attempts: u32,
    retry_delay: Duration,
    lookup_timeout: Duration,
    snapshot_timeout: Duration,
    refresh_after_failed_rounds: u32,
}

impl Resolver {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Resolver {
            manager,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(500),
            lookup_timeout: Duration::from_secs(3),
            snapshot_timeout: Duration::from_secs(10),
            refresh_after_failed_rounds: 1,
        }
    }

    pub fn from_config(manager: Arc<CacheManager>, config: &ElementCacheConfig) -> Self {
        Resolver::new(manager)
            .with_max_attempts(config.resolver_max_attempts)
            .with_retry_delay(config.retry_delay())
            .with_lookup_timeout(config.lookup_timeout())
            .with_snapshot_timeout(config.snapshot_timeout())
            .with_refresh_after(config.refresh_after_failed_rounds)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    /// Force a cache refresh every `rounds` failed rounds; 0 disables.
    pub fn with_refresh_after(mut self, rounds: u32) -> Self {
        self.refresh_after_failed_rounds = rounds;
        self
    }

    pub fn resolve<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        desc: &ElementDescription,
    ) -> Result<Resolution, ResolveError> {
        self.resolve_with_attempts(driver, key, desc, self.max_attempts)
    }

    /// Up to `max_attempts` rounds of the full strategy list, with a fixed
    /// delay between rounds. First success wins.
    pub fn resolve_with_attempts<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        key: &PageKey,
        desc: &ElementDescription,
        max_attempts: u32,
    ) -> Result<Resolution, ResolveError> {
        let strategies = plan(desc);
        if strategies.is_empty() {
            return Err(ResolveError::EmptyDescription(desc.summary()));
        }

        let rounds = max_attempts.max(1);
        let tracer = self.manager.tracer();
        let mut cached = self.manager.cached_elements(key);
        let mut attempts = Vec::with_capacity(strategies.len() * rounds as usize);

        for round in 1..=rounds {
            let mut live = LiveView::NotTaken;

            for &strategy in &strategies {
                let outcome =
                    self.run_strategy(strategy, desc, driver, &cached, &mut live);

                match outcome {
                    StrategyOutcome::Found(found) => {
                        attempts.push(StrategyAttempt {
                            round,
                            strategy,
                            found: true,
                        });
                        info!(
                            page_key = %key,
                            strategy = %strategy,
                            attempt = round,
                            handle = %found.handle,
                            "resolved element"
                        );
                        tracer.log(
                            &TraceEvent::now(key, "resolved")
                                .with_strategy(strategy)
                                .with_attempt(round)
                                .with_handle(&found.handle),
                        );
                        return Ok(Resolution {
                            handle: found.handle,
                            strategy,
                            round,
                            attempts,
                        });
                    }
                    StrategyOutcome::Continue(reason) => {
                        attempts.push(StrategyAttempt {
                            round,
                            strategy,
                            found: false,
                        });
                        debug!(
                            page_key = %key,
                            strategy = %strategy,
                            attempt = round,
                            reason = %reason,
                            "strategy did not match"
                        );
                        tracer.log(
                            &TraceEvent::now(key, "strategy_attempt")
                                .with_strategy(strategy)
                                .with_attempt(round)
                                .with_detail(reason),
                        );
                    }
                    StrategyOutcome::Fatal(source) => {
                        warn!(
                            page_key = %key,
                            strategy = %strategy,
                            attempt = round,
                            error = %source,
                            "page session lost during resolution"
                        );
                        return Err(ResolveError::SessionLost {
                            description: desc.summary(),
                            source,
                        });
                    }
                }
            }

            if round < rounds {
                if !self.retry_delay.is_zero() {
                    thread::sleep(self.retry_delay);
                }
                if self.refresh_after_failed_rounds > 0
                    && round % self.refresh_after_failed_rounds == 0
                {
                    info!(page_key = %key, attempt = round, "requesting cache refresh after failed round");
                    cached = self.manager.get_elements(driver, key, true);
                }
            }
        }

        warn!(
            page_key = %key,
            description = %desc.summary(),
            rounds,
            attempts = attempts.len(),
            "element resolution exhausted"
        );
        tracer.log(
            &TraceEvent::now(key, "exhausted")
                .with_attempt(rounds)
                .with_detail(desc.summary()),
        );

        Err(ResolveError::NotFound {
            description: desc.summary(),
            rounds,
            attempts: attempts.len(),
        })
    }

    fn run_strategy<D: PageDriver + ?Sized>(
        &self,
        strategy: StrategyKind,
        desc: &ElementDescription,
        driver: &mut D,
        cached: &ElementSet,
        live: &mut LiveView,
    ) -> StrategyOutcome {
        match strategy {
            StrategyKind::Handle => match &desc.handle {
                Some(handle) => {
                    self.direct_lookup(driver, &LiveQuery::Handle(handle.trim().to_string()), desc)
                }
                None => StrategyOutcome::Continue("no handle".into()),
            },
            StrategyKind::Selector => match &desc.selector {
                Some(selector) => {
                    self.direct_lookup(driver, &LiveQuery::Selector(selector.trim().to_string()), desc)
                }
                None => StrategyOutcome::Continue("no selector".into()),
            },
            StrategyKind::Role | StrategyKind::Text => {
                self.scan(strategy, desc, driver, cached, live)
            }
        }
    }

    fn direct_lookup<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        query: &LiveQuery,
        desc: &ElementDescription,
    ) -> StrategyOutcome {
        match driver.live_lookup(query, self.lookup_timeout) {
            Ok(Some(found)) if live_match_acceptable(&found, desc) => StrategyOutcome::Found(found),
            Ok(Some(found)) => StrategyOutcome::Continue(format!(
                "{} matched {} but it is hidden or not interactive",
                query.describe(),
                found.handle
            )),
            Ok(None) => StrategyOutcome::Continue(format!("{} matched nothing", query.describe())),
            Err(e) if e.is_fatal() => StrategyOutcome::Fatal(e),
            Err(e) => StrategyOutcome::Continue(format!("{} failed: {}", query.describe(), e)),
        }
    }

    /// Scan of the round's live snapshot. A cached match is a hint only: its
    /// handle wins when the live record at that handle still matches.
    fn scan<D: PageDriver + ?Sized>(
        &self,
        strategy: StrategyKind,
        desc: &ElementDescription,
        driver: &mut D,
        cached: &ElementSet,
        live: &mut LiveView,
    ) -> StrategyOutcome {
        let snapshot = match self.live_snapshot(driver, live) {
            Ok(snapshot) => snapshot,
            Err(outcome) => return outcome,
        };

        let hinted = cached
            .iter_natural()
            .into_iter()
            .filter(|(_, record)| record_matches(strategy, record, desc))
            .find_map(|(handle, _)| {
                let current = snapshot.get(handle)?;
                if record_matches(strategy, current, desc) {
                    Some((handle, current))
                } else {
                    debug!(handle = %handle, "cached candidate no longer matches live");
                    None
                }
            });

        let found = hinted.or_else(|| {
            snapshot
                .iter_natural()
                .into_iter()
                .find(|(_, record)| record_matches(strategy, record, desc))
        });

        match found {
            Some((handle, record)) => StrategyOutcome::Found(LiveMatch {
                handle: handle.clone(),
                visible: true,
                interactive: record.is_interactive,
            }),
            None => StrategyOutcome::Continue(format!(
                "no visible element matches by {}",
                strategy
            )),
        }
    }

    fn live_snapshot<'v, D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        live: &'v mut LiveView,
    ) -> Result<&'v ElementSet, StrategyOutcome> {
        if matches!(live, LiveView::NotTaken) {
            *live = match driver.snapshot(self.snapshot_timeout) {
                Ok(set) => LiveView::Taken(set),
                Err(e) if e.is_fatal() => return Err(StrategyOutcome::Fatal(e)),
                Err(e) => LiveView::Failed(e.to_string()),
            };
        }

        match live {
            LiveView::Taken(set) => Ok(set),
            LiveView::Failed(reason) => Err(StrategyOutcome::Continue(format!(
                "live snapshot failed: {}",
                reason
            ))),
            LiveView::NotTaken => Err(StrategyOutcome::Continue("live snapshot unavailable".into())),
        }
    }
}
