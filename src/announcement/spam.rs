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

//! Spam detection (`spec.md` §4.7.5): duplicate-content detection, topic
//! fan-out limits, and reannounce-rate limits, each tracked independently
//! of the rate limiter (which is per-source, not per-content).

use std::collections::HashMap;
use std::sync::Mutex;

use super::types::Announcement;
use crate::codec::Hash32;

const MAX_DUPLICATES_DEFAULT: u32 = 3;
const DUPLICATE_WINDOW_SECS: i64 = 3600;
const MAX_DISTINCT_TOPICS: usize = 10;
const MAX_REANNOUNCES_IN_WINDOW: u32 = 5;
const REANNOUNCE_WINDOW_SECS: i64 = 5 * 60;
const SIMILARITY_WINDOW_SECS: i64 = 24 * 3600;

/// Content-hash identity used for duplicate detection: SHA-256 of
/// `descriptor || topic_hash || category || size_class || tag_bloom`.
pub fn content_hash(ann: &Announcement) -> String {
    let mut buf = Vec::new();
    buf.extend_from_slice(ann.descriptor_cid.as_bytes());
    buf.extend_from_slice(ann.topic_hash.as_bytes());
    buf.extend_from_slice(format!("{:?}", ann.category).as_bytes());
    buf.extend_from_slice(format!("{:?}", ann.size_class).as_bytes());
    buf.extend_from_slice(ann.tag_bloom.as_deref().unwrap_or("").as_bytes());
    Hash32::digest(&buf).to_hex()
}

/// Tracking state for one content hash.
struct DuplicateEntry {
    count: u32,
    first_seen: i64,
    last_seen: i64,
}

/// Tracking state for one descriptor across all the topics it's been
/// announced under.
struct DescriptorEntry {
    topics: HashMap<String, u32>,
    /// Timestamps of reannounces within the last `REANNOUNCE_WINDOW_SECS`,
    /// oldest first; pruned on every [`SpamDetector::classify`] call.
    reannounce_times: Vec<i64>,
    first_seen: i64,
    last_seen: i64,
}

/// Why [`SpamDetector::classify`] flagged an announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpamReason {
    /// The same content hash has been seen too many times within the
    /// duplicate window.
    DuplicateAnnouncement {
        /// How many times it had already been seen before this one.
        seen: u32,
    },
    /// The same descriptor has been announced under too many distinct
    /// topics.
    ExcessiveTopicFanout,
    /// The same descriptor has been reannounced too many times in a short
    /// window.
    ExcessiveReannounceRate,
    /// The tag bloom filter matched a banned pattern.
    BannedTagPattern,
    /// A structural implausibility (future timestamp, excessive ttl, or
    /// an implausible category/size_class pair) that also doubles as a
    /// spam signal.
    ImplausibleContent(String),
}

/// Tracks per-content-hash and per-descriptor statistics to classify
/// announcements as spam (`spec.md` §4.7.5).
pub struct SpamDetector {
    max_duplicates: u32,
    banned_bloom_patterns: Vec<String>,
    duplicates: Mutex<HashMap<String, DuplicateEntry>>,
    descriptors: Mutex<HashMap<String, DescriptorEntry>>,
}

impl Default for SpamDetector {
    fn default() -> Self {
        Self::new(MAX_DUPLICATES_DEFAULT, Vec::new())
    }
}

impl SpamDetector {
    /// Build a detector with `max_duplicates` and a list of bloom-filter
    /// base64url strings treated as known-banned patterns.
    pub fn new(max_duplicates: u32, banned_bloom_patterns: Vec<String>) -> Self {
        Self {
            max_duplicates,
            banned_bloom_patterns,
            duplicates: Mutex::new(HashMap::new()),
            descriptors: Mutex::new(HashMap::new()),
        }
    }

    /// Classify `ann` as spam or not, recording it either way so future
    /// calls see its effect (mirrors the spec's "tracks" language: the
    /// classification itself is the recording step).
    pub fn classify(&self, ann: &Announcement, now: i64) -> Option<SpamReason> {
        if ann.timestamp - now > 5 * 60 {
            return Some(SpamReason::ImplausibleContent("timestamp too far in future".into()));
        }
        if ann.ttl > 7 * 24 * 3600 {
            return Some(SpamReason::ImplausibleContent("ttl exceeds one week".into()));
        }
        if ann.descriptor_cid.is_empty() || ann.topic_hash.is_empty() {
            return Some(SpamReason::ImplausibleContent("required field missing".into()));
        }
        if let Some(bloom) = &ann.tag_bloom {
            if self.banned_bloom_patterns.iter().any(|p| p == bloom) {
                return Some(SpamReason::BannedTagPattern);
            }
        }

        let hash = content_hash(ann);
        let duplicate_reason = {
            let mut dups = self.duplicates.lock().expect("spam duplicates poisoned");
            let entry = dups.entry(hash).or_insert(DuplicateEntry {
                count: 0,
                first_seen: now,
                last_seen: now,
            });
            if now - entry.first_seen > DUPLICATE_WINDOW_SECS {
                entry.count = 0;
                entry.first_seen = now;
            }
            let seen_before = entry.count;
            entry.count += 1;
            entry.last_seen = now;
            if seen_before >= self.max_duplicates {
                Some(SpamReason::DuplicateAnnouncement { seen: seen_before })
            } else {
                None
            }
        };

        let descriptor_reason = {
            let mut descs = self.descriptors.lock().expect("spam descriptors poisoned");
            let entry = descs.entry(ann.descriptor_cid.clone()).or_insert(DescriptorEntry {
                topics: HashMap::new(),
                reannounce_times: Vec::new(),
                first_seen: now,
                last_seen: now,
            });
            *entry.topics.entry(ann.topic_hash.clone()).or_insert(0) += 1;
            entry.reannounce_times.retain(|&t| now - t <= REANNOUNCE_WINDOW_SECS);
            entry.reannounce_times.push(now);
            let recent_reannounces = entry.reannounce_times.len() as u32;
            entry.last_seen = now;

            if entry.topics.len() > MAX_DISTINCT_TOPICS {
                Some(SpamReason::ExcessiveTopicFanout)
            } else if recent_reannounces > MAX_REANNOUNCES_IN_WINDOW {
                Some(SpamReason::ExcessiveReannounceRate)
            } else {
                None
            }
        };

        duplicate_reason.or(descriptor_reason)
    }

    /// Purge tracking entries unseen for `similarity_window` seconds
    /// (default 24h), per `spec.md` §4.7.5's periodic cleanup.
    pub fn cleanup(&self, now: i64) {
        self.cleanup_with_window(now, SIMILARITY_WINDOW_SECS);
    }

    fn cleanup_with_window(&self, now: i64, window: i64) {
        self.duplicates
            .lock()
            .expect("spam duplicates poisoned")
            .retain(|_, e| now - e.last_seen < window);
        self.descriptors
            .lock()
            .expect("spam descriptors poisoned")
            .retain(|_, e| now - e.last_seen < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcement::types::{Category, SizeClass, ANNOUNCEMENT_VERSION};

    fn sample(descriptor: &str, topic: &str, nonce: &str) -> Announcement {
        Announcement {
            version: ANNOUNCEMENT_VERSION.to_string(),
            descriptor_cid: descriptor.to_string(),
            topic_hash: topic.to_string(),
            tag_bloom: None,
            category: Category::Video,
            size_class: SizeClass::Medium,
            timestamp: 1_700_000_000,
            ttl: 3600,
            nonce: Some(nonce.to_string()),
            peer_id: None,
            signature: None,
        }
    }

    #[test]
    fn fourth_duplicate_within_window_is_spam() {
        let detector = SpamDetector::new(3, Vec::new());
        let now = 1_700_000_000;
        let ann = sample("bafyX", &"a".repeat(64), "n1");
        assert_eq!(detector.classify(&ann, now), None);
        assert_eq!(detector.classify(&ann, now + 1), None);
        assert_eq!(detector.classify(&ann, now + 2), None);
        assert_eq!(
            detector.classify(&ann, now + 3),
            Some(SpamReason::DuplicateAnnouncement { seen: 3 })
        );
    }

    #[test]
    fn excessive_topic_fanout_is_spam() {
        let detector = SpamDetector::new(1000, Vec::new());
        let now = 1_700_000_000;
        for i in 0..=MAX_DISTINCT_TOPICS {
            let topic = format!("{:0>64}", i);
            let nonce = format!("n{i}");
            let ann = sample("bafyFanout", &topic, &nonce);
            let reason = detector.classify(&ann, now + i as i64 * 10_000);
            if i == MAX_DISTINCT_TOPICS {
                assert_eq!(reason, Some(SpamReason::ExcessiveTopicFanout));
            }
        }
    }

    #[test]
    fn burst_reannounces_within_window_is_spam() {
        let detector = SpamDetector::new(1000, Vec::new());
        let now = 1_700_000_000;
        let topic = "a".repeat(64);
        let mut last = None;
        for i in 0..6 {
            let nonce = format!("n{i}");
            let ann = sample("bafyBurst", &topic, &nonce);
            last = Some(detector.classify(&ann, now + i * 10));
        }
        assert_eq!(last.unwrap(), Some(SpamReason::ExcessiveReannounceRate));
    }

    #[test]
    fn reannounces_spread_outside_window_are_not_spam() {
        let detector = SpamDetector::new(1000, Vec::new());
        let now = 1_700_000_000;
        let topic = "a".repeat(64);
        // Five reannounces a week apart, each well outside the other's
        // reannounce window, followed by two more close together: only
        // the trailing two should count toward the sliding window.
        for i in 0..5 {
            let nonce = format!("old{i}");
            let ann = sample("bafySpread", &topic, &nonce);
            let reason = detector.classify(&ann, now + i * 7 * 24 * 3600);
            assert_eq!(reason, None);
        }
        let recent_base = now + 5 * 7 * 24 * 3600;
        let ann = sample("bafySpread", &topic, "recent0");
        assert_eq!(detector.classify(&ann, recent_base), None);
        let ann = sample("bafySpread", &topic, "recent1");
        assert_eq!(detector.classify(&ann, recent_base + 10), None);
    }

    #[test]
    fn implausible_future_timestamp_is_spam() {
        let detector = SpamDetector::default();
        let now = 1_700_000_000;
        let mut ann = sample("bafyY", &"b".repeat(64), "n2");
        ann.timestamp = now + 3601;
        assert!(matches!(
            detector.classify(&ann, now),
            Some(SpamReason::ImplausibleContent(_))
        ));
    }
}
