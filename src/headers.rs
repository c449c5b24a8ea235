//! Case-insensitive, insertion-ordered header multimap.
//!
//! [`Headers`] is the single header contract shared by every provider. Names
//! are folded to lower case on the way in, so lookups, deletion and existence
//! checks ignore case, and the stored/iterated names are always the folded
//! form. Each name maps to an ordered list of values.
//!
//! # Example
//!
//! ```
//! use courier::Headers;
//!
//! let mut headers = Headers::new();
//! headers.set("Content-Type", "text/plain");
//! headers.append("Accept", "text/html");
//! headers.append("accept", "application/json");
//!
//! assert_eq!(headers.get("content-type"), Some("text/plain"));
//! assert_eq!(headers.get_all("ACCEPT"), vec!["text/html", "application/json"]);
//! assert_eq!(headers.entries().count(), 3);
//! ```

use std::collections::HashMap;
use std::fmt;

/// Ordered multimap of lower-cased header names to value lists.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Creates an empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        let key = name.to_ascii_lowercase();
        self.entries.iter().position(|(k, _)| *k == key)
    }

    /// Adds a value without clobbering the values already stored for `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        match self.position(name) {
            Some(index) => self.entries[index].1.push(value.into()),
            None => self.set(name, value),
        }
    }

    /// Replaces every value stored for `name` with a single value.
    ///
    /// An existing name keeps its position in iteration order.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let values = vec![value.into()];
        match self.position(name) {
            Some(index) => self.entries[index].1 = values,
            None => self.entries.push((name.to_ascii_lowercase(), values)),
        }
    }

    /// Returns the first value stored for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|index| self.entries[index].1.first())
            .map(String::as_str)
    }

    /// Returns a copy of every value stored for `name` (empty if absent).
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.position(name)
            .map(|index| self.entries[index].1.clone())
            .unwrap_or_default()
    }

    /// Returns true if any value is stored for `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes `name` and all of its values.
    pub fn delete(&mut self, name: &str) {
        if let Some(index) = self.position(name) {
            self.entries.remove(index);
        }
    }

    /// Snapshot of `(name, value)` pairs, one pair per stored value.
    ///
    /// The returned iterator is detached from `self` and can be cloned to
    /// restart it.
    #[must_use]
    pub fn entries(&self) -> std::vec::IntoIter<(String, String)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.clone(), v.clone())))
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Snapshot of the stored (lower-cased) names.
    #[must_use]
    pub fn keys(&self) -> std::vec::IntoIter<String> {
        self.entries
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Snapshot of every stored value, flattened across names.
    #[must_use]
    pub fn values(&self) -> std::vec::IntoIter<String> {
        self.entries
            .iter()
            .flat_map(|(_, values)| values.iter().cloned())
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no header is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

/// Builds headers from `(name, value)` pairs, appending each pair.
impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.append(name.as_ref(), value);
        }
    }
}

/// Builds headers from a dictionary, one `set` per field.
impl<S: std::hash::BuildHasher> From<HashMap<String, String, S>> for Headers {
    fn from(map: HashMap<String, String, S>) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            headers.set(&name, value);
        }
        headers
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Headers {
    fn from(fields: [(&str, &str); N]) -> Self {
        let mut headers = Self::new();
        for (name, value) in fields {
            headers.set(name, value);
        }
        headers
    }
}
