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

//! Search over the local announcement store (`spec.md` §4.7.7): a
//! tag/topic_hash/time-bucket index plus scored query composition, and a
//! probabilistic tag-recovery dictionary that tests candidate tags
//! against an announcement's bloom filter.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::bloom::BloomFilter;
use super::store::AnnouncementStore;
use super::topic::hash_topic;
use super::types::{Announcement, Category, SizeClass};

const HOUR_SECS: i64 = 3600;
const RECENCY_24H_BOOST: f64 = 1.5;
const RECENCY_7D_BOOST: f64 = 1.2;
const SEVEN_DAYS_SECS: i64 = 7 * 24 * 3600;

/// How `query.tags` are weighed against a candidate's bloom filter
/// (`spec.md` §4.7.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TagMatchMode {
    /// `matched / total` — partial credit for each tag that tests
    /// positive.
    #[default]
    Any,
    /// `1.0` iff every tag tests positive, else `0.0`.
    All,
    /// Same as `All`: a bloom filter can confirm membership but never
    /// prove absence, so "exact" is only ever a best-effort upper bound
    /// on `All`.
    Exact,
}

/// Query parameters for [`SearchIndex::search`].
#[derive(Clone, Debug, Default)]
pub struct SearchQuery {
    /// Free-text tags the caller is interested in (matched against each
    /// candidate's bloom filter, contributing to `tag_score`).
    pub tags: Vec<String>,
    /// How `tags` are combined into `tag_score`.
    pub tag_mode: TagMatchMode,
    /// Exact keywords to match against each candidate's indexed
    /// (already-known, non-probabilistic) tags, contributing to
    /// `keyword_score`. Unlike `tags`, these are looked up in
    /// [`SearchIndex`]'s own tag index rather than bloom-tested.
    pub keywords: Vec<String>,
    /// Restrict results to this topic path (and its normalization),
    /// matched via [`SearchIndex`]'s topic index.
    pub topic: Option<String>,
    /// Restrict results to this category, if set.
    pub category: Option<Category>,
    /// Restrict results to this size class, if set.
    pub size_class: Option<SizeClass>,
    /// Tags whose presence disqualifies a candidate.
    pub exclude_tags: Vec<String>,
    /// Only consider announcements with `timestamp` in `[from, to]`.
    pub time_window: Option<(i64, i64)>,
}

/// A scored search hit.
#[derive(Clone, Debug)]
pub struct SearchHit {
    /// The matched announcement.
    pub announcement: Announcement,
    /// Composed relevance score (higher is better).
    pub score: f64,
}

/// Maintains `tag → [descriptor]`, `topic_hash → [descriptor]`, and an
/// hour-bucketed `time bucket → [descriptor]` index over announcements
/// added via [`SearchIndex::index`]. [`SearchIndex::search`] composes its
/// candidate set from these indices — an [`AnnouncementStore`] is
/// consulted only to resolve a descriptor id back to its full
/// [`Announcement`] records.
pub struct SearchIndex {
    by_tag: RwLock<HashMap<String, HashSet<String>>>,
    by_topic: RwLock<HashMap<String, HashSet<String>>>,
    by_hour: RwLock<HashMap<i64, HashSet<String>>>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    /// Build an empty index.
    pub fn new() -> Self {
        Self {
            by_tag: RwLock::new(HashMap::new()),
            by_topic: RwLock::new(HashMap::new()),
            by_hour: RwLock::new(HashMap::new()),
        }
    }

    /// Record `ann` (identified by `descriptor_cid`) under its topic hash,
    /// its time bucket, and any `known_tags` recovered for it (the bloom
    /// filter itself does not reveal tags; callers supply tags discovered
    /// via [`TagDictionary::recover`] or otherwise known out of band).
    pub fn index(&self, ann: &Announcement, known_tags: &[String]) {
        let bucket = ann.timestamp.div_euclid(HOUR_SECS);
        self.by_hour
            .write()
            .expect("search time index poisoned")
            .entry(bucket)
            .or_default()
            .insert(ann.descriptor_cid.clone());

        self.by_topic
            .write()
            .expect("search topic index poisoned")
            .entry(ann.topic_hash.clone())
            .or_default()
            .insert(ann.descriptor_cid.clone());

        let mut by_tag = self.by_tag.write().expect("search tag index poisoned");
        for tag in known_tags {
            by_tag
                .entry(tag.to_lowercase())
                .or_default()
                .insert(ann.descriptor_cid.clone());
        }
    }

    /// Run `query` against `store`, scoring and ranking matches.
    ///
    /// Candidate set: `intersect(topic-matched ∪ time-recent ∪ all)`
    /// (`spec.md` §4.7.7) — a constraint that is unset contributes the
    /// universal set, so the candidate set is the intersection of
    /// whichever of `topic`/`time_window` are actually set, defaulting to
    /// every resident announcement when neither is. The result is then
    /// filtered by category, size_class, and exclude-tags, and scored as
    /// `1.0 * (1 + tag_score) * (1 + keyword_score) * recency_boost`,
    /// where `tag_score` is `query.tag_mode`'s combination of bloom tests
    /// against `query.tags`, `keyword_score` is the fraction of
    /// `query.keywords` found in this index's own tag index for that
    /// descriptor, and `recency_boost` is 1.5 within 24h, 1.2 within 7
    /// days, else 1.0.
    pub fn search(&self, store: &AnnouncementStore, query: &SearchQuery, now: i64) -> Vec<SearchHit> {
        let topic_matched: Option<HashSet<String>> = query.topic.as_deref().map(|t| {
            self.by_topic
                .read()
                .expect("search topic index poisoned")
                .get(&hash_topic(t))
                .cloned()
                .unwrap_or_default()
        });

        let time_recent: Option<HashSet<String>> = query.time_window.map(|(from, to)| {
            let from_bucket = from.div_euclid(HOUR_SECS);
            let to_bucket = to.div_euclid(HOUR_SECS);
            let by_hour = self.by_hour.read().expect("search time index poisoned");
            by_hour
                .iter()
                .filter(|(&bucket, _)| bucket >= from_bucket && bucket <= to_bucket)
                .flat_map(|(_, ids)| ids.iter().cloned())
                .collect()
        });

        let candidate_ids: Option<HashSet<String>> = match (topic_matched, time_recent) {
            (Some(a), Some(b)) => Some(a.intersection(&b).cloned().collect()),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        let candidates: Vec<Announcement> = match candidate_ids {
            Some(ids) => ids.iter().flat_map(|cid| store.get_by_descriptor(cid)).collect(),
            None => store.get_by_time_range(i64::MIN, i64::MAX),
        };

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|a| query.time_window.map(|(from, to)| a.timestamp >= from && a.timestamp <= to).unwrap_or(true))
            .filter(|a| query.category.map(|c| c == a.category).unwrap_or(true))
            .filter(|a| query.size_class.map(|s| s == a.size_class).unwrap_or(true))
            .filter(|a| !Self::matches_excluded(a, &query.exclude_tags))
            .map(|a| {
                let tag_score = Self::tag_score(&a, &query.tags, query.tag_mode);
                let keyword_score = self.keyword_score(&a.descriptor_cid, &query.keywords);
                let recency = Self::recency_boost(a.timestamp, now);
                let score = 1.0 * (1.0 + tag_score) * (1.0 + keyword_score) * recency;
                SearchHit { announcement: a, score }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    fn matches_excluded(ann: &Announcement, exclude_tags: &[String]) -> bool {
        let Some(bloom) = ann.tag_bloom.as_deref() else {
            return false;
        };
        let Ok(filter) = BloomFilter::from_base64url(bloom) else {
            return false;
        };
        exclude_tags.iter().any(|t| filter.test(t))
    }

    fn tag_score(ann: &Announcement, tags: &[String], mode: TagMatchMode) -> f64 {
        if tags.is_empty() {
            return 0.0;
        }
        let Some(bloom) = ann.tag_bloom.as_deref() else {
            return 0.0;
        };
        let Ok(filter) = BloomFilter::from_base64url(bloom) else {
            return 0.0;
        };
        let matched = tags.iter().filter(|t| filter.test(t)).count();
        match mode {
            TagMatchMode::Any => matched as f64 / tags.len() as f64,
            TagMatchMode::All | TagMatchMode::Exact => {
                if matched == tags.len() {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn keyword_score(&self, descriptor_cid: &str, keywords: &[String]) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let by_tag = self.by_tag.read().expect("search tag index poisoned");
        let matched = keywords
            .iter()
            .filter(|k| by_tag.get(&k.to_lowercase()).is_some_and(|ids| ids.contains(descriptor_cid)))
            .count();
        matched as f64 / keywords.len() as f64
    }

    fn recency_boost(timestamp: i64, now: i64) -> f64 {
        let age = (now - timestamp).max(0);
        if age <= 24 * HOUR_SECS {
            RECENCY_24H_BOOST
        } else if age <= SEVEN_DAYS_SECS {
            RECENCY_7D_BOOST
        } else {
            1.0
        }
    }
}

/// A candidate tag's learned statistics (`spec.md` §4.7.7).
#[derive(Clone, Copy, Debug, Default)]
struct LearnedTag {
    success_count: u32,
    test_count: u32,
    last_seen_unix: i64,
}

impl LearnedTag {
    fn confidence(&self, now: i64) -> f64 {
        if self.test_count == 0 {
            return 0.0;
        }
        let success_rate = self.success_count as f64 / self.test_count as f64;
        let days_since = ((now - self.last_seen_unix).max(0) as f64) / 86_400.0;
        success_rate * (1.0 / (1.0 + days_since * 0.1))
    }
}

const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;
const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// Tag recovery config.
#[derive(Clone, Copy, Debug)]
pub struct TagRecoveryConfig {
    /// Minimum confidence (core tags are always tried regardless) before a
    /// learned or prefixed candidate is tested against the bloom filter.
    pub min_confidence: f64,
    /// Upper bound on candidates tested per recovery call.
    pub max_candidates: usize,
}

impl Default for TagRecoveryConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// A three-tier tag dictionary (core / learned / structured prefixes)
/// used to probabilistically recover the tags behind an announcement's
/// bloom filter, since the filter itself is a one-way summary.
pub struct TagDictionary {
    config: TagRecoveryConfig,
    core: Vec<String>,
    prefixes: Vec<(String, Vec<String>)>,
    learned: RwLock<HashMap<String, LearnedTag>>,
}

impl TagDictionary {
    /// Build a dictionary with a fixed `core` tag set and `prefixes`
    /// (each a `(prefix, values)` pair, e.g. `("res:", vec!["720p",
    /// "1080p", "4k"])`, expanded into `"res:720p"` etc).
    pub fn new(config: TagRecoveryConfig, core: Vec<String>, prefixes: Vec<(String, Vec<String>)>) -> Self {
        Self {
            config,
            core,
            prefixes,
            learned: RwLock::new(HashMap::new()),
        }
    }

    /// Recover the tags most likely present in `ann`'s bloom filter, by
    /// testing core tags unconditionally, then learned and structured
    /// candidates above `min_confidence`, capped at `max_candidates`
    /// tests, and recording success/failure statistics as it goes.
    pub fn recover(&self, ann: &Announcement, now: i64) -> Vec<String> {
        let Some(bloom) = ann.tag_bloom.as_deref() else {
            return Vec::new();
        };
        let Ok(filter) = BloomFilter::from_base64url(bloom) else {
            return Vec::new();
        };

        let mut candidates: Vec<String> = self.core.clone();
        {
            let learned = self.learned.read().expect("tag dictionary poisoned");
            let mut ranked: Vec<(String, f64)> = learned
                .iter()
                .map(|(tag, stats)| (tag.clone(), stats.confidence(now)))
                .filter(|(_, c)| *c >= self.config.min_confidence)
                .collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            candidates.extend(ranked.into_iter().map(|(tag, _)| tag));
        }
        for (prefix, values) in &self.prefixes {
            for value in values {
                candidates.push(format!("{prefix}{value}"));
            }
        }
        candidates.truncate(self.config.max_candidates);

        let mut recovered = Vec::new();
        let mut learned = self.learned.write().expect("tag dictionary poisoned");
        for candidate in candidates {
            let hit = filter.test(&candidate);
            let stats = learned.entry(candidate.clone()).or_default();
            stats.test_count += 1;
            stats.last_seen_unix = now;
            if hit {
                stats.success_count += 1;
                recovered.push(candidate);
            }
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcement::types::ANNOUNCEMENT_VERSION;

    fn ann_with_tags(descriptor: &str, topic: &str, timestamp: i64, tags: &[&str]) -> Announcement {
        let owned_tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let bloom = BloomFilter::from_tags(&owned_tags, 0.01);
        Announcement {
            version: ANNOUNCEMENT_VERSION.to_string(),
            descriptor_cid: descriptor.to_string(),
            topic_hash: topic.to_string(),
            tag_bloom: Some(bloom.to_base64url()),
            category: Category::Video,
            size_class: SizeClass::Medium,
            timestamp,
            ttl: 3600,
            nonce: Some("n".to_string()),
            peer_id: None,
            signature: None,
        }
    }

    #[test]
    fn search_ranks_recent_and_tag_matching_higher() {
        let store = AnnouncementStore::new(Default::default());
        let now = 1_700_000_000;
        let recent = ann_with_tags("bafy1", &"a".repeat(64), now - 10, &["action", "1080p"]);
        let old = ann_with_tags("bafy2", &"a".repeat(64), now - SEVEN_DAYS_SECS - 1000, &["action"]);
        store.add(recent, now);
        store.add(old, now);

        let index = SearchIndex::new();
        let query = SearchQuery {
            tags: vec!["action".to_string()],
            ..Default::default()
        };
        let hits = index.search(&store, &query, now);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].announcement.descriptor_cid, "bafy1");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn search_excludes_by_tag() {
        let store = AnnouncementStore::new(Default::default());
        let now = 1_700_000_000;
        store.add(ann_with_tags("bafy1", &"b".repeat(64), now, &["cam-rip"]), now);

        let index = SearchIndex::new();
        let query = SearchQuery {
            exclude_tags: vec!["cam-rip".to_string()],
            ..Default::default()
        };
        let hits = index.search(&store, &query, now);
        assert!(hits.is_empty());
    }

    #[test]
    fn tag_recovery_finds_planted_tags_and_learns_confidence() {
        let dict = TagDictionary::new(
            TagRecoveryConfig::default(),
            vec!["action".to_string(), "comedy".to_string()],
            vec![("res:".to_string(), vec!["720p".to_string(), "1080p".to_string()])],
        );
        let ann = ann_with_tags("bafy1", &"c".repeat(64), 1000, &["action", "res:1080p"]);
        let recovered = dict.recover(&ann, 1000);
        assert!(recovered.contains(&"action".to_string()));
        assert!(recovered.contains(&"res:1080p".to_string()));
        assert!(!recovered.contains(&"comedy".to_string()));
    }

    #[test]
    fn low_confidence_learned_tags_are_skipped() {
        let dict = TagDictionary::new(TagRecoveryConfig::default(), Vec::new(), Vec::new());
        // Seed a learned tag with a poor track record.
        {
            let mut learned = dict.learned.write().unwrap();
            learned.insert(
                "noise".to_string(),
                LearnedTag {
                    success_count: 0,
                    test_count: 10,
                    last_seen_unix: 0,
                },
            );
        }
        let ann = ann_with_tags("bafy1", &"d".repeat(64), 1000, &["action"]);
        let recovered = dict.recover(&ann, 1000);
        assert!(!recovered.contains(&"noise".to_string()));
    }

    #[test]
    fn search_restricts_to_indexed_topic() {
        let store = AnnouncementStore::new(Default::default());
        let now = 1_700_000_000;
        let matching = ann_with_tags("bafy1", &hash_topic("movies/action"), now, &["action"]);
        let other = ann_with_tags("bafy2", &hash_topic("music/jazz"), now, &["action"]);
        store.add(matching.clone(), now);
        store.add(other, now);

        let index = SearchIndex::new();
        index.index(&matching, &[]);
        // Note: the non-matching announcement is deliberately left
        // unindexed, exercising that `search` only returns announcements
        // the topic index actually knows about.

        let query = SearchQuery {
            topic: Some("movies/action".to_string()),
            ..Default::default()
        };
        let hits = index.search(&store, &query, now);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].announcement.descriptor_cid, "bafy1");
    }

    #[test]
    fn search_time_window_uses_hour_index() {
        let store = AnnouncementStore::new(Default::default());
        let now = 1_700_000_000;
        let in_window = ann_with_tags("bafy1", &"e".repeat(64), now, &[]);
        let out_of_window = ann_with_tags("bafy2", &"e".repeat(64), now - 10 * HOUR_SECS, &[]);
        store.add(in_window.clone(), now);
        store.add(out_of_window.clone(), now);

        let index = SearchIndex::new();
        index.index(&in_window, &[]);
        index.index(&out_of_window, &[]);

        let query = SearchQuery {
            time_window: Some((now - HOUR_SECS, now)),
            ..Default::default()
        };
        let hits = index.search(&store, &query, now);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].announcement.descriptor_cid, "bafy1");
    }

    #[test]
    fn tag_mode_all_requires_every_tag_to_match() {
        let ann = ann_with_tags("bafy1", &"f".repeat(64), 1000, &["action", "1080p"]);
        let any_score = SearchIndex::tag_score(&ann, &["action".to_string(), "missing".to_string()], TagMatchMode::Any);
        let all_score = SearchIndex::tag_score(&ann, &["action".to_string(), "missing".to_string()], TagMatchMode::All);
        assert!(any_score > 0.0 && any_score < 1.0);
        assert_eq!(all_score, 0.0);

        let all_match = SearchIndex::tag_score(&ann, &["action".to_string(), "1080p".to_string()], TagMatchMode::All);
        assert_eq!(all_match, 1.0);
    }

    #[test]
    fn keyword_score_reflects_indexed_tags_not_bloom() {
        let store = AnnouncementStore::new(Default::default());
        let now = 1_700_000_000;
        let ann = ann_with_tags("bafy1", &"g".repeat(64), now, &["action"]);
        store.add(ann.clone(), now);

        let index = SearchIndex::new();
        index.index(&ann, &["action".to_string(), "director:someone".to_string()]);

        let query = SearchQuery {
            keywords: vec!["director:someone".to_string()],
            ..Default::default()
        };
        let hits = index.search(&store, &query, now);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 1.0 * SearchIndex::recency_boost(now, now));
    }
}
