// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Normalized key/value tags attached to a metric.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// An immutable, order-preserving set of `(key, value)` pairs attached to a metric.
///
/// Keys and values are case-folded to lower-case on construction and pairs whose
/// key or value is empty are dropped. When a key appears more than once only its
/// first occurrence is kept.
///
/// The pair *order* is significant for identity: `[a=1, b=2]` and `[b=2, a=1]`
/// hash to different identifiers. See [`crate::telemetry::identifier`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct MetricTags {
    pairs: Vec<(String, String)>,
}

impl MetricTags {
    /// The empty tag set.
    pub const NONE: MetricTags = MetricTags { pairs: Vec::new() };

    /// Builds a normalized tag set from any sequence of pairs.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut cleaned: Vec<(String, String)> = Vec::new();
        for (key, value) in pairs {
            let key = key.as_ref().trim().to_lowercase();
            let value = value.as_ref().trim().to_lowercase();
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if cleaned.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            cleaned.push((key, value));
        }
        Self { pairs: cleaned }
    }

    /// Builds a tag set holding a single pair.
    pub fn pair(key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        Self::new([(key, value)])
    }

    /// Returns a new tag set with `(key, value)` appended after the existing pairs.
    pub fn with(&self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let appended = self
            .pairs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(std::iter::once((
                key.as_ref().to_string(),
                value.as_ref().to_string(),
            )));
        Self::new(appended)
    }

    /// The normalized pairs in construction order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Looks up the value stored for `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` for the empty tag set.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of pairs in the set.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Iterates over the pairs as string slices.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for MetricTags {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl Display for MetricTags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{joined}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let tags = MetricTags::default();
        assert!(tags.is_empty());
        assert_eq!(tags, MetricTags::NONE);
    }

    #[test]
    fn test_pairs_are_lowercased() {
        let tags = MetricTags::new([("Host", "WEB-01")]);
        assert_eq!(tags.pairs(), &[("host".to_string(), "web-01".to_string())]);
        assert_eq!(tags.get("HOST"), Some("web-01"));
    }

    #[test]
    fn test_empty_keys_and_values_are_dropped() {
        let tags = MetricTags::new([("", "value"), ("key", ""), ("  ", "x"), ("region", "eu")]);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("region"), Some("eu"));
    }

    #[test]
    fn test_order_is_preserved() {
        let tags = MetricTags::new([("b", "2"), ("a", "1")]);
        let keys: Vec<_> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let tags = MetricTags::new([("env", "prod"), ("ENV", "dev")]);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("env"), Some("prod"));
    }

    #[test]
    fn test_with_appends_pair() {
        let tags = MetricTags::pair("tag", "value").with("MetricType", "system");
        assert_eq!(tags.to_string(), "tag:value,metrictype:system");
    }
}
