use serde::{Deserialize, Serialize};

use crate::element::element_model::ElementHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMatch {
    /// Whitespace-normalized equality
    Exact,
    /// Case-insensitive substring
    #[default]
    Fuzzy,
}

/// Partial description of the element a caller wants to interact with.
///
/// Any combination of fields may be set; each set field enables one
/// resolution strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDescription {
    #[serde(default, alias = "index")]
    pub handle: Option<ElementHandle>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Accessible name, only meaningful together with `role`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub text_match: TextMatch,
    /// Restricts text matches to one tag
    #[serde(default)]
    pub tag: Option<String>,
    /// Reject matches the page does not report as interactive
    #[serde(default)]
    pub interactive_only: bool,
}

impl ElementDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(mut self, handle: impl Into<ElementHandle>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>, name: Option<&str>) -> Self {
        self.role = Some(role.into());
        self.name = name.map(str::to_string);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>, mode: TextMatch) -> Self {
        self.text = Some(text.into());
        self.text_match = mode;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn interactive_only(mut self) -> Self {
        self.interactive_only = true;
        self
    }

    /// Short human-readable summary for logs and errors.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(h) = &self.handle {
            parts.push(format!("handle={}", h));
        }
        if let Some(s) = &self.selector {
            parts.push(format!("selector={}", s));
        }
        if let Some(r) = &self.role {
            match &self.name {
                Some(n) => parts.push(format!("role={} name={}", r, n)),
                None => parts.push(format!("role={}", r)),
            }
        }
        if let Some(t) = &self.text {
            let mode = match self.text_match {
                TextMatch::Exact => "exact",
                TextMatch::Fuzzy => "fuzzy",
            };
            parts.push(format!("text({})={:?}", mode, t));
        }
        if let Some(tag) = &self.tag {
            parts.push(format!("tag={}", tag));
        }
        if parts.is_empty() {
            "<empty>".to_string()
        } else {
            parts.join(" ")
        }
    }
}
