//! Case-insensitive HTTP header map.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NetworkError, Result};

/// A map from header name to value.
///
/// Names are lowercased on insert, so lookups are case-insensitive. Entries
/// are kept in name order and each name holds a single value: writing a name
/// again replaces the previous value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: BTreeMap<String, String>,
}

impl HeaderMap {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, replacing any previous value.
    pub fn add(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Store `value` under `name` only if the name has no value yet.
    pub fn add_if_absent(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(name.as_ref().to_ascii_lowercase())
            .or_insert_with(|| value.into());
    }

    /// Look up a header value by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.entries
            .get(&name.as_ref().to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<String> {
        self.entries.remove(&name.as_ref().to_ascii_lowercase())
    }

    /// Check whether a header is present.
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as `name: value\r\n` lines, without a trailing blank line.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Parse a header block.
    ///
    /// Lines are separated by `\n` with an optional preceding `\r`. Parsing
    /// stops at the first empty line. Lines without a `:` are skipped; names
    /// and values are trimmed of spaces and tabs. A line with an empty name
    /// is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut headers = Self::new();

        for line in raw.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = trim_ows(name);
            if name.is_empty() {
                return Err(NetworkError::MalformedHeaders(format!(
                    "header line without a name: {line:?}"
                )));
            }
            headers.add(name, trim_ows(value));
        }

        Ok(headers)
    }
}

/// Trim optional whitespace (spaces and tabs) from both ends.
fn trim_ows(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\t')
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for HeaderMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.add(name, value);
        }
    }
}
