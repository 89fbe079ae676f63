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

//! The local announcement store (`spec.md` §4.7.8): idempotent insertion
//! keyed by `(descriptor, nonce)`, with secondary indices by topic hash,
//! descriptor, and timestamp, bounded by size and age.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use super::types::Announcement;

/// Bounds and sweep cadence for the store. Defaults match `spec.md`
/// §4.7.8.
#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    /// Maximum resident announcements before the oldest are evicted.
    pub max_size: usize,
    /// Maximum age (seconds) before an announcement is eligible for
    /// cleanup, independent of its own `ttl`.
    pub max_age_secs: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            max_age_secs: 7 * 24 * 3600,
        }
    }
}

#[derive(Clone)]
struct Record {
    announcement: Announcement,
    inserted_at: i64,
}

/// A read-heavy, `RwLock`-protected announcement store. Cleanup sweeps
/// take the write lock briefly (`spec.md` §5).
pub struct AnnouncementStore {
    config: StoreConfig,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<(String, String), Record>,
    insertion_order: Vec<(String, String)>,
    by_topic: HashMap<String, HashSet<(String, String)>>,
    by_descriptor: HashMap<String, HashSet<(String, String)>>,
    by_timestamp: BTreeMap<i64, HashSet<(String, String)>>,
}

impl AnnouncementStore {
    /// Build an empty store with `config`.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Insert `ann`, keyed by `(descriptor_cid, nonce)`. Idempotent: a
    /// second insert of the same key is a no-op and returns `false`.
    /// Evicts the oldest record if the store is at capacity.
    pub fn add(&self, ann: Announcement, now: i64) -> bool {
        let nonce = ann.nonce.clone().unwrap_or_default();
        let key = (ann.descriptor_cid.clone(), nonce);

        let mut inner = self.inner.write().expect("announcement store poisoned");
        if inner.records.contains_key(&key) {
            return false;
        }

        if inner.records.len() >= self.config.max_size {
            if let Some(oldest_key) = inner.insertion_order.first().cloned() {
                Self::remove_locked(&mut inner, &oldest_key);
            }
        }

        inner
            .by_topic
            .entry(ann.topic_hash.clone())
            .or_default()
            .insert(key.clone());
        inner
            .by_descriptor
            .entry(ann.descriptor_cid.clone())
            .or_default()
            .insert(key.clone());
        inner
            .by_timestamp
            .entry(ann.timestamp)
            .or_default()
            .insert(key.clone());
        inner.insertion_order.push(key.clone());
        inner.records.insert(
            key,
            Record {
                announcement: ann,
                inserted_at: now,
            },
        );
        true
    }

    fn remove_locked(inner: &mut Inner, key: &(String, String)) {
        if let Some(record) = inner.records.remove(key) {
            if let Some(set) = inner.by_topic.get_mut(&record.announcement.topic_hash) {
                set.remove(key);
            }
            if let Some(set) = inner.by_descriptor.get_mut(&record.announcement.descriptor_cid) {
                set.remove(key);
            }
            if let Some(set) = inner.by_timestamp.get_mut(&record.announcement.timestamp) {
                set.remove(key);
            }
        }
        inner.insertion_order.retain(|k| k != key);
    }

    /// All announcements matching `topic_hash`.
    pub fn get_by_topic(&self, topic_hash: &str) -> Vec<Announcement> {
        let inner = self.inner.read().expect("announcement store poisoned");
        inner
            .by_topic
            .get(topic_hash)
            .into_iter()
            .flatten()
            .filter_map(|k| inner.records.get(k).map(|r| r.announcement.clone()))
            .collect()
    }

    /// All announcements for `descriptor_cid`, across every topic and
    /// nonce it has been announced under.
    pub fn get_by_descriptor(&self, descriptor_cid: &str) -> Vec<Announcement> {
        let inner = self.inner.read().expect("announcement store poisoned");
        inner
            .by_descriptor
            .get(descriptor_cid)
            .into_iter()
            .flatten()
            .filter_map(|k| inner.records.get(k).map(|r| r.announcement.clone()))
            .collect()
    }

    /// All announcements with `timestamp` in `[from, to]`, inclusive.
    pub fn get_by_time_range(&self, from: i64, to: i64) -> Vec<Announcement> {
        let inner = self.inner.read().expect("announcement store poisoned");
        inner
            .by_timestamp
            .range(from..=to)
            .flat_map(|(_, keys)| keys.iter())
            .filter_map(|k| inner.records.get(k).map(|r| r.announcement.clone()))
            .collect()
    }

    /// Total resident announcement count.
    pub fn len(&self) -> usize {
        self.inner.read().expect("announcement store poisoned").records.len()
    }

    /// True if the store holds no announcements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every announcement that has expired (`timestamp + ttl <=
    /// now`) or exceeded `max_age_secs` since insertion (`spec.md` §3
    /// "MUST be purged on the next sweep after expiry").
    pub fn cleanup(&self, now: i64) -> usize {
        let mut inner = self.inner.write().expect("announcement store poisoned");
        let expired: Vec<(String, String)> = inner
            .records
            .iter()
            .filter(|(_, r)| r.announcement.is_expired(now) || now - r.inserted_at > self.config.max_age_secs)
            .map(|(k, _)| k.clone())
            .collect();
        let removed = expired.len();
        for key in expired {
            Self::remove_locked(&mut inner, &key);
        }
        removed
    }
}
