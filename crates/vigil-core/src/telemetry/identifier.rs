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

//! Deterministic metric identifiers.
//!
//! An identifier is the metric name followed by the decimal rendering of a
//! polynomial hash (seed 17, multiplier 31) folded over the tag keys and values
//! in their stored order, key then value for each pair. Catalog lookups, catalog removals and the retention cleaner all
//! go through [`calculate`], so an entry registered under one identifier is
//! always reachable by the others.

use crate::telemetry::tags::MetricTags;

const SEED: i32 = 17;
const PRIME: i32 = 31;

/// Computes the identifier for `name` and `tags`.
///
/// Pure and total: identical inputs always produce the identical string.
pub fn calculate(name: &str, tags: &MetricTags) -> String {
    format!("{name}{}", tags_hash(tags))
}

/// Computes the identifier for an optional name, treating `None` as empty.
pub fn calculate_opt(name: Option<&str>, tags: &MetricTags) -> String {
    calculate(name.unwrap_or_default(), tags)
}

fn tags_hash(tags: &MetricTags) -> i32 {
    tags.iter().fold(SEED, |hash, (key, value)| {
        let hash = hash.wrapping_mul(PRIME).wrapping_add(string_hash(key));
        hash.wrapping_mul(PRIME).wrapping_add(string_hash(value))
    })
}

/// Stable string hash, independent of process and platform.
fn string_hash(text: &str) -> i32 {
    text.chars()
        .fold(0i32, |hash, c| hash.wrapping_mul(PRIME).wrapping_add(c as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_without_tags_uses_seed() {
        assert_eq!(calculate("test", &MetricTags::NONE), "test17");
    }

    #[test]
    fn test_missing_name_is_seed_only() {
        assert_eq!(calculate_opt(None, &MetricTags::NONE), "17");
        assert_eq!(calculate("", &MetricTags::NONE), "17");
    }

    #[test]
    fn test_same_key_same_value_is_stable() {
        let a = calculate("test", &MetricTags::pair("key", "abc"));
        let b = calculate("test", &MetricTags::pair("key", "abc"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_key_different_value_differs() {
        let a = calculate("test", &MetricTags::pair("key", "abc"));
        let b = calculate("test", &MetricTags::pair("key", "123"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_key_same_value_differs() {
        let a = calculate("test", &MetricTags::pair("key1", "abc"));
        let b = calculate("test", &MetricTags::pair("key2", "abc"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_key_different_value_differs() {
        let a = calculate("test", &MetricTags::pair("key1", "abc"));
        let b = calculate("test", &MetricTags::pair("key2", "123"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_separator_inside_key_or_value_differs() {
        let in_key = MetricTags::pair("a:b", "c");
        let in_value = MetricTags::pair("a", "b:c");
        assert_ne!(in_key, in_value);
        assert_ne!(calculate("test", &in_key), calculate("test", &in_value));
    }

    #[test]
    fn test_pair_order_changes_identifier() {
        // Order-sensitive on purpose: the tag sequence, not the tag set, is hashed.
        let forward = MetricTags::new([("a", "1"), ("b", "2")]);
        let reversed = MetricTags::new([("b", "2"), ("a", "1")]);
        assert_ne!(calculate("test", &forward), calculate("test", &reversed));
    }

    #[test]
    fn test_normalized_tags_share_identifier() {
        let upper = MetricTags::pair("Host", "WEB");
        let lower = MetricTags::pair("host", "web");
        assert_eq!(calculate("test", &upper), calculate("test", &lower));
    }
}
