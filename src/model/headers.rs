//! Ordered header mapping with case-insensitive, first-match lookup.

use serde::{Deserialize, Serialize};

/// Message headers as received, in order.
///
/// Duplicate names are kept; lookups return the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any earlier header with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, compared ASCII case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name`, or `default` when the header is absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let headers: HeaderMap = [("SUBJECT", "Hello")].into_iter().collect();
        assert_eq!(headers.get("subject"), Some("Hello"));
        assert_eq!(headers.get("Subject"), Some("Hello"));
    }

    #[test]
    fn test_first_match_wins() {
        let headers: HeaderMap = [("Received", "first"), ("received", "second")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("Received"), Some("first"));
        assert_eq!(headers.get_all("RECEIVED").count(), 2);
    }

    #[test]
    fn test_default_when_absent() {
        let headers = HeaderMap::new();
        assert_eq!(headers.get_or("Date", "No Date"), "No Date");
        assert!(headers.is_empty());
    }
}
