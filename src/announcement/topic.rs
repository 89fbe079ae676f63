// Copyright (c) 2026 NoiseFS contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Topic normalization and hashing (`spec.md` §4.7.1).
//!
//! `hash_topic(topic) = sha256(normalize(topic))`. Normalization is
//! lowercase, trim, collapse consecutive `/`, drop empty path components,
//! rejoin with a single `/`.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::codec::Hash32;

/// Normalize a topic path: lowercase, trim, collapse `/` runs, drop empty
/// components, rejoin with single `/`.
pub fn normalize_topic(topic: &str) -> String {
    topic
        .trim()
        .to_lowercase()
        .split('/')
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// SHA-256 of the normalized topic, as 64 lowercase hex chars. Two topic
/// strings whose normalizations are equal always hash equal.
pub fn hash_topic(topic: &str) -> String {
    Hash32::digest(normalize_topic(topic).as_bytes()).to_hex()
}

/// A per-process cache from normalized topic to its hash, so repeated
/// hashing of the same topic (common when many announcements share a
/// topic) avoids re-running SHA-256. Constructor-injected, never a hidden
/// global, per `spec.md` §9.
pub struct TopicHasher {
    cache: Mutex<HashMap<String, String>>,
}

impl Default for TopicHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicHasher {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Hash `topic`, normalizing first and serving from cache when
    /// possible.
    pub fn hash(&self, topic: &str) -> String {
        let normalized = normalize_topic(topic);
        let mut cache = self.cache.lock().expect("topic hasher cache poisoned");
        if let Some(hash) = cache.get(&normalized) {
            return hash.clone();
        }
        let hash = Hash32::digest(normalized.as_bytes()).to_hex();
        cache.insert(normalized, hash.clone());
        hash
    }

    /// Number of distinct normalized topics currently cached.
    pub fn cache_size(&self) -> usize {
        self.cache.lock().expect("topic hasher cache poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_slashes_and_case() {
        assert_eq!(normalize_topic("  Movies//Action/ "), "movies/action");
        assert_eq!(normalize_topic("///"), "");
        assert_eq!(normalize_topic("A/B/C"), "a/b/c");
    }

    #[test]
    fn equal_normalizations_hash_equal() {
        let h1 = hash_topic("Movies/Action");
        let h2 = hash_topic("  movies//action/");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hasher_caches_and_is_consistent() {
        let hasher = TopicHasher::new();
        let a = hasher.hash("music/jazz");
        assert_eq!(hasher.cache_size(), 1);
        let b = hasher.hash("Music//Jazz");
        assert_eq!(a, b);
        assert_eq!(hasher.cache_size(), 1);
    }
}
