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

//! The announcement subsystem (`spec.md` §3-§4.7): discoverable, signed
//! bindings from a topic to a descriptor CID, published and filtered
//! over a gossip network without ever revealing file contents.
//!
//! Submodules compose bottom-up: [`types`] is the wire record,
//! [`topic`] and [`bloom`] derive its discoverable fields, [`signing`]
//! authenticates it, [`validation`]/[`ratelimit`]/[`spam`]/[`reputation`]
//! gate inbound traffic, [`store`] holds what's accepted, and
//! [`search`]/[`hierarchy`] make the store queryable. [`discovery`]
//! wires all of it to a libp2p gossipsub swarm.

pub mod bloom;
pub mod discovery;
pub mod hierarchy;
pub mod ratelimit;
pub mod reputation;
pub mod search;
pub mod signing;
pub mod spam;
pub mod store;
pub mod topic;
pub mod types;
pub mod validation;

pub use discovery::{DiscoveryConfig, DiscoveryError, DiscoveryEvent, DiscoveryHandle, Gatekeeper};
pub use hierarchy::TopicHierarchy;
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use reputation::{ReputationConfig, ReputationSystem, TrustLevel};
pub use search::{SearchIndex, SearchQuery, TagDictionary, TagMatchMode, TagRecoveryConfig};
pub use spam::SpamDetector;
pub use store::{AnnouncementStore, StoreConfig};
pub use types::{Announcement, AnnouncementCodecError, Category, SizeClass};
pub use validation::{AnnouncementValidator, ValidationConfig, ValidationError};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Every piece a node needs to participate in the announcement network:
/// validate, rate-limit, spam-filter, and trust inbound announcements,
/// then make accepted ones queryable. Owns no network state itself —
/// that's [`discovery::spawn_discovery`]'s job, which takes a
/// [`Gatekeeper`] built from these same pieces.
pub struct AnnouncementService {
    /// Accepted, locally resident announcements.
    pub store: Arc<AnnouncementStore>,
    /// Search index over `store`.
    pub search: SearchIndex,
    /// The topic namespace announcements are organized under.
    pub hierarchy: TopicHierarchy,
}

impl Default for AnnouncementService {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl AnnouncementService {
    /// Build an empty service with the given store bounds.
    pub fn new(store_config: StoreConfig) -> Self {
        Self {
            store: Arc::new(AnnouncementStore::new(store_config)),
            search: SearchIndex::new(),
            hierarchy: TopicHierarchy::new(),
        }
    }

    /// Build a [`Gatekeeper`] sharing this service's store, for use with
    /// [`discovery::spawn_discovery`].
    pub fn gatekeeper(&self, validation: ValidationConfig) -> Gatekeeper {
        Gatekeeper::new(Arc::clone(&self.store), validation)
    }

    /// Register `topic` in the hierarchy and index `ann` for search
    /// under `known_tags`. Does not itself insert `ann` into the store;
    /// call this after [`AnnouncementStore::add`] succeeds.
    pub fn index(&self, topic: &str, ann: &Announcement, known_tags: &[String]) {
        self.hierarchy.add(topic);
        self.search.index(ann, known_tags);
    }

    /// Run periodic maintenance: purge expired/aged announcements from
    /// the store (`spec.md` §9 background sweep).
    pub fn sweep(&self, now: i64) -> usize {
        self.store.cleanup(now)
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A running background sweep task plus the handle to stop it.
///
/// `spec.md` §9 flags the source's cleanup/decay loops ("background
/// sweeps as goroutines") as needing an explicit shutdown channel in a
/// systems language, mirroring how [`discovery::spawn_discovery`] returns
/// a `JoinHandle` for its swarm loop. `shutdown` sends on a
/// [`watch`] channel the loop selects against, then awaits the join.
pub struct SweepHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the sweep loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Spawn a periodic task that calls [`Gatekeeper::cleanup`] every
/// `interval`, bounding the memory held by the rate limiter, spam
/// detector, reputation system, and announcement store for a
/// long-running node.
pub fn spawn_gatekeeper_sweeps(gatekeeper: Arc<Gatekeeper>, interval: Duration) -> SweepHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = gatekeeper.cleanup(unix_now());
                    debug!(removed, "announcement sweep complete");
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
    SweepHandle { shutdown: shutdown_tx, join }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_indexes_and_finds_announcements() {
        let service = AnnouncementService::default();
        let bloom = bloom::BloomFilter::from_tags(&["action".to_string()], 0.01);
        let ann = Announcement {
            version: types::ANNOUNCEMENT_VERSION.to_string(),
            descriptor_cid: "bafy1".to_string(),
            topic_hash: topic::hash_topic("movies/action"),
            tag_bloom: Some(bloom.to_base64url()),
            category: Category::Video,
            size_class: SizeClass::Medium,
            timestamp: 1_700_000_000,
            ttl: 3600,
            nonce: Some("nonce123".to_string()),
            peer_id: None,
            signature: None,
        };
        assert!(service.store.add(ann.clone(), 1_700_000_000));
        service.index("movies/action", &ann, &["action".to_string()]);

        assert!(service.hierarchy.get("movies/action").is_some());
        let hits = service.search.search(
            &service.store,
            &SearchQuery {
                tags: vec!["action".to_string()],
                ..Default::default()
            },
            1_700_000_000,
        );
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn sweep_purges_expired_announcements() {
        let service = AnnouncementService::default();
        let ann = Announcement {
            version: types::ANNOUNCEMENT_VERSION.to_string(),
            descriptor_cid: "bafy2".to_string(),
            topic_hash: "a".repeat(64),
            tag_bloom: None,
            category: Category::Other,
            size_class: SizeClass::Tiny,
            timestamp: 1000,
            ttl: 10,
            nonce: Some("nonceabc".to_string()),
            peer_id: None,
            signature: None,
        };
        service.store.add(ann, 1000);
        assert_eq!(service.sweep(1020), 1);
    }
}
