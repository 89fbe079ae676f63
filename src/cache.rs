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

//! The block cache (`spec.md` §4.4): an LRU with a popularity boost, and
//! the substrate the randomizer pool draws candidates from.
//!
//! Sharded by `hash(cid) % shard_count`, matching the concurrency model
//! described in `spec.md` §5 ("internal lock may be sharded by hash(cid)")
//! and the style of the teacher's `PeerScore` (a small, integer-only,
//! mutex-guarded map indexed by a stable key).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::block::Block;

const SHARD_COUNT: usize = 16;

#[derive(Clone)]
struct Entry {
    block: Block,
    hits: u64,
    last_access: Instant,
    pinned: bool,
}

struct Shard {
    entries: HashMap<String, Entry>,
}

/// A thread-safe, capacity-bounded cache of `cid -> Block`.
///
/// Eviction policy: LRU with a popularity boost — each hit increments a
/// counter that multiplies the entry's effective age, so a frequently
/// reused randomizer block survives longer than a one-off fetch even if it
/// was accessed less recently in wall-clock terms. An entry currently
/// referenced by an in-flight triple build (`pin`/`unpin`) is never
/// evicted.
pub struct BlockCache {
    shards: Vec<Mutex<Shard>>,
    capacity: usize,
}

fn shard_index(cid: &str) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    cid.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

impl BlockCache {
    /// Create a cache bounded to `capacity` resident blocks in total
    /// (split roughly evenly across internal shards).
    pub fn new(capacity: usize) -> Arc<Self> {
        let shards = (0..SHARD_COUNT)
            .map(|_| {
                Mutex::new(Shard {
                    entries: HashMap::new(),
                })
            })
            .collect();
        Arc::new(Self { shards, capacity })
    }

    /// Fetch a resident block, recording a hit for the popularity boost.
    pub fn get(&self, cid: &str) -> Option<Block> {
        let idx = shard_index(cid);
        let mut shard = self.shards[idx].lock().expect("cache shard poisoned");
        let entry = shard.entries.get_mut(cid)?;
        entry.hits = entry.hits.saturating_add(1);
        entry.last_access = Instant::now();
        Some(entry.block.clone())
    }

    /// Insert (or refresh) a block, evicting the least-valuable resident
    /// entry in the same shard if it is at capacity.
    pub fn put(&self, cid: String, block: Block) {
        let idx = shard_index(&cid);
        let mut shard = self.shards[idx].lock().expect("cache shard poisoned");
        let per_shard_cap = (self.capacity / SHARD_COUNT).max(1);

        if let Some(existing) = shard.entries.get_mut(&cid) {
            existing.block = block;
            existing.last_access = Instant::now();
            return;
        }

        if shard.entries.len() >= per_shard_cap {
            Self::evict_one(&mut shard);
        }

        shard.entries.insert(
            cid,
            Entry {
                block,
                hits: 0,
                last_access: Instant::now(),
                pinned: false,
            },
        );
    }

    /// Mark a CID as currently referenced by an in-flight triple build,
    /// making it ineligible for eviction until [`unpin`](Self::unpin).
    pub fn pin(&self, cid: &str) {
        let idx = shard_index(cid);
        let mut shard = self.shards[idx].lock().expect("cache shard poisoned");
        if let Some(e) = shard.entries.get_mut(cid) {
            e.pinned = true;
        }
    }

    /// Release a pin previously taken by [`pin`](Self::pin).
    pub fn unpin(&self, cid: &str) {
        let idx = shard_index(cid);
        let mut shard = self.shards[idx].lock().expect("cache shard poisoned");
        if let Some(e) = shard.entries.get_mut(cid) {
            e.pinned = false;
        }
    }

    /// Current number of resident blocks across all shards.
    pub fn size(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("cache shard poisoned").entries.len())
            .sum()
    }

    fn evict_one(shard: &mut Shard) {
        let now = Instant::now();
        let victim = shard
            .entries
            .iter()
            .filter(|(_, e)| !e.pinned)
            .min_by_key(|(_, e)| {
                let age_ms = now.duration_since(e.last_access).as_millis() as u64;
                // Popularity boost: each hit divides the effective age,
                // so a well-loved entry looks younger than it is.
                age_ms / (e.hits + 1)
            })
            .map(|(cid, _)| cid.clone());
        if let Some(cid) = victim {
            shard.entries.remove(&cid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_put_round_trip() {
        let cache = BlockCache::new(8);
        cache.put("cid1".to_string(), Block::new(vec![1, 2, 3]));
        assert_eq!(cache.get("cid1").unwrap().as_bytes(), &[1, 2, 3]);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn pinned_entries_survive_eviction_pressure() {
        // Force every key into the same shard behavior by using a capacity
        // of 1 "effective" shard worth of entries; since SHARD_COUNT=16, a
        // capacity of 16 gives each shard a cap of 1.
        let cache = BlockCache::new(16);
        cache.put("hot".to_string(), Block::new(vec![9]));
        cache.pin("hot");

        // Insert enough distinct keys that some will land in "hot"'s shard
        // and attempt to evict it; since it's pinned it must survive.
        for i in 0..64 {
            cache.put(format!("filler-{i}"), Block::new(vec![0]));
        }
        assert!(cache.get("hot").is_some());
    }

    #[test]
    fn miss_returns_none() {
        let cache = BlockCache::new(4);
        assert!(cache.get("absent").is_none());
    }
}
