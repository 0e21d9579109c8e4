use std::fmt;

use crate::browser::driver::DriverError;
use crate::element::element_model::{ElementRecord, LiveMatch};
use crate::resolver::description::{ElementDescription, TextMatch};

/// Resolution strategies, in the order they are tried within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyKind {
    Handle,
    Selector,
    Role,
    Text,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Handle => "handle",
            StrategyKind::Selector => "selector",
            StrategyKind::Role => "role",
            StrategyKind::Text => "text",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of running one strategy once.
#[derive(Debug)]
pub enum StrategyOutcome {
    Found(LiveMatch),
    /// Not found this time; try the next strategy or round
    Continue(String),
    /// The session cannot answer anymore
    Fatal(DriverError),
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Applicable strategies for `desc`, most specific first.
pub fn plan(desc: &ElementDescription) -> Vec<StrategyKind> {
    let mut strategies = Vec::new();
    if present(&desc.handle).is_some() {
        strategies.push(StrategyKind::Handle);
    }
    if present(&desc.selector).is_some() {
        strategies.push(StrategyKind::Selector);
    }
    if present(&desc.role).is_some() {
        strategies.push(StrategyKind::Role);
    }
    if present(&desc.text).is_some() {
        strategies.push(StrategyKind::Text);
    }
    strategies
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Role matches case-insensitively; a name must be contained
/// (case-insensitively) in the element's text or aria-label.
pub fn matches_role(record: &ElementRecord, role: &str, name: Option<&str>) -> bool {
    let role_matches = record
        .attribute("role")
        .is_some_and(|r| r.eq_ignore_ascii_case(role.trim()));
    if !role_matches {
        return false;
    }

    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => true,
        Some(name) => {
            let needle = name.to_lowercase();
            record.text.to_lowercase().contains(&needle)
                || record
                    .attribute("aria-label")
                    .is_some_and(|l| l.to_lowercase().contains(&needle))
        }
    }
}

pub fn matches_text(
    record: &ElementRecord,
    text: &str,
    mode: TextMatch,
    tag: Option<&str>,
) -> bool {
    if let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) {
        if !record.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }

    match mode {
        TextMatch::Exact => normalize_whitespace(&record.text) == normalize_whitespace(text),
        TextMatch::Fuzzy => record
            .text
            .to_lowercase()
            .contains(&text.trim().to_lowercase()),
    }
}

/// Whether a record found by a scanning strategy is acceptable for `desc`.
pub fn record_matches(kind: StrategyKind, record: &ElementRecord, desc: &ElementDescription) -> bool {
    if record.is_hidden() {
        return false;
    }
    if desc.interactive_only && !record.is_interactive {
        return false;
    }

    match kind {
        StrategyKind::Role => match present(&desc.role) {
            Some(role) => matches_role(record, role, desc.name.as_deref()),
            None => false,
        },
        StrategyKind::Text => match present(&desc.text) {
            Some(text) => matches_text(record, text, desc.text_match, desc.tag.as_deref()),
            None => false,
        },
        StrategyKind::Handle | StrategyKind::Selector => false,
    }
}

/// Whether a live match is acceptable for `desc`.
pub fn live_match_acceptable(found: &LiveMatch, desc: &ElementDescription) -> bool {
    found.visible && (!desc.interactive_only || found.interactive)
}
