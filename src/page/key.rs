use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Normalized identity of a page: base URL plus its query parameters.
///
/// Parameters are kept in a sorted map, so two URLs that differ only in
/// parameter order produce equal keys and the same cache file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageKey {
    pub url: String,
    pub params: BTreeMap<String, String>,
}

impl PageKey {
    /// Build a key from a base URL and an explicit parameter list.
    ///
    /// A repeated parameter name keeps the last value.
    pub fn new<I, K, V>(url: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PageKey {
            url: url.to_string(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build a key from a full URL, splitting off and parsing its query string.
    /// The fragment is not part of page identity and is dropped.
    pub fn from_url(full_url: &str) -> Self {
        let without_fragment = full_url.split('#').next().unwrap_or("");
        match without_fragment.split_once('?') {
            Some((base, query)) => PageKey::new(base, parse_query(query)),
            None => PageKey::new(without_fragment, Vec::<(String, String)>::new()),
        }
    }

    /// `url` alone when there are no parameters, otherwise `url?k=v&k=v` with
    /// keys in lexicographic order.
    pub fn normalized(&self) -> String {
        if self.params.is_empty() {
            return self.url.clone();
        }

        let param_str = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.url, param_str)
    }

    /// Filesystem-safe name for this key's durable record (hex SHA-1 of the
    /// normalized key).
    pub fn cache_file_key(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.normalized().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// Split a raw query string into `(key, value)` pairs.
///
/// Segments without `=` carry no value and are skipped.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
