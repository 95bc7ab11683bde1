//! Proxy/CDN header trust resolution
//!
//! Everything in here works on a [`HeaderSet`], a case-insensitive view of the
//! request headers that is built once per request. Header names are folded to
//! lowercase with `_` mapped to `-` at construction time, so lookups on the hot
//! path are a single hash probe.

pub mod ip_extractor;
pub mod trusted;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

pub use ip_extractor::{
    detect_proxy_type, extract_connection_info, extract_real_ip, resolve_proxy, validate_headers,
    ConnectionInfo, ProxyResolution, ProxyVendor, Scheme,
};
pub use trusted::TrustedProxies;

pub(crate) const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Reasons a header set is considered untrustworthy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderValidationError {
    #[error("invalid Cloudflare headers: {0}")]
    InvalidCfHeaders(String),
    #[error("untrusted hop {hop} in x-forwarded-for chain")]
    UntrustedForwardedHeaders { hop: String },
    #[error("inconsistent headers: {0}")]
    InconsistentHeaders(String),
}

/// Immutable, case-insensitive header collection
///
/// Insertion order is preserved. Repeated `x-forwarded-for` headers are joined
/// into one comma separated chain; for any other repeated header the first
/// occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HeaderInput", into = "IndexMap<String, String>")]
pub struct HeaderSet {
    entries: IndexMap<String, String>,
}

/// Accepted wire shapes for headers: a JSON object or a list of pairs
#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderInput {
    Map(IndexMap<String, String>),
    Pairs(Vec<(String, String)>),
}

impl From<HeaderInput> for HeaderSet {
    fn from(input: HeaderInput) -> Self {
        match input {
            HeaderInput::Map(map) => map.into_iter().collect(),
            HeaderInput::Pairs(pairs) => pairs.into_iter().collect(),
        }
    }
}

impl From<HeaderSet> for IndexMap<String, String> {
    fn from(set: HeaderSet) -> Self {
        set.entries
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderSet
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entries: IndexMap<String, String> = IndexMap::new();

        for (name, value) in iter {
            let key = normalize_name(name.as_ref()).into_owned();
            let value = value.into();

            match entries.get_mut(&key) {
                Some(existing) if key == X_FORWARDED_FOR => {
                    let value = value.trim();
                    if existing.is_empty() {
                        existing.push_str(value);
                    } else if !value.is_empty() {
                        existing.push_str(", ");
                        existing.push_str(value);
                    }
                }
                Some(_) => {}
                None => {
                    entries.insert(key, value.trim().to_string());
                }
            }
        }

        Self { entries }
    }
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header by name in any casing
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(normalize_name(name).as_ref())
            .map(String::as_str)
    }

    /// Look up a header and treat an empty value as missing
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True when any of the given names is present
    pub fn contains_any(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.contains(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(normalized name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries of the `x-forwarded-for` chain, trimmed, empty entries removed
    pub fn forwarded_chain(&self) -> Vec<&str> {
        self.get(X_FORWARDED_FOR)
            .map(|chain| {
                chain
                    .split(',')
                    .map(str::trim)
                    .filter(|hop| !hop.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Fold a header name to its lookup key
///
/// Already-normalized names (the common case for constants) are borrowed.
fn normalize_name(name: &str) -> Cow<'_, str> {
    let name = name.trim();
    let needs_folding = name
        .bytes()
        .any(|b| b.is_ascii_uppercase() || b == b'_');

    if needs_folding {
        Cow::Owned(
            name.chars()
                .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
                .collect(),
        )
    } else {
        Cow::Borrowed(name)
    }
}

#[cfg(feature = "axum")]
impl From<&axum::http::HeaderMap> for HeaderSet {
    /// Values that are not valid visible ASCII are skipped.
    fn from(map: &axum::http::HeaderMap) -> Self {
        map.iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }
}
