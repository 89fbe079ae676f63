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

//! Per-source reputation (`spec.md` §4.7.6), generalizing the teacher's
//! integer peer score (`networking::peer_score::PeerScore`, a ban/
//! throttle/allow decision on a single counter) into the spec's five-class
//! trust ladder with linear time decay and a history-gated "trusted"
//! class.

use std::collections::HashMap;
use std::sync::Mutex;

/// Score bounds and event weights. Defaults match `spec.md` §4.7.6.
#[derive(Clone, Copy, Debug)]
pub struct ReputationConfig {
    /// Minimum score a source can reach.
    pub min: f64,
    /// Maximum score a source can reach.
    pub max: f64,
    /// Initial score assigned to a never-seen source.
    pub initial: f64,
    /// Added on a positive event.
    pub weight_positive: f64,
    /// Subtracted on a negative event.
    pub weight_negative: f64,
    /// Score units decayed per day of inactivity, pulling the score back
    /// toward the midpoint.
    pub decay_rate: f64,
    /// Minimum event count before a source can reach "trusted".
    pub required_history: u32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            initial: 50.0,
            weight_positive: 1.0,
            weight_negative: 5.0,
            decay_rate: 1.0,
            required_history: 10,
        }
    }
}

/// The five-class trust ladder (`spec.md` §4.7.6), ordered from least to
/// most trusted band by normalized score `n = (score - min) / (max - min)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    /// `n <= 0.2`; also the blacklist threshold.
    Untrusted,
    /// `0.2 < n < 0.4`.
    Suspicious,
    /// `0.4 <= n < 0.6`.
    Neutral,
    /// `0.6 <= n < 0.8`.
    Good,
    /// `n >= 0.8` and at least `required_history` events recorded.
    Trusted,
}

struct SourceState {
    score: f64,
    events: u32,
    last_event_unix: i64,
}

/// Tracks a reputation score per source id, with linear decay toward the
/// midpoint on inactivity and a background sweep that forgets long-dead
/// sources.
pub struct ReputationSystem {
    config: ReputationConfig,
    sources: Mutex<HashMap<String, SourceState>>,
}

impl ReputationSystem {
    /// Build a system with `config`.
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            config,
            sources: Mutex::new(HashMap::new()),
        }
    }

    fn decay_locked(&self, state: &mut SourceState, now: i64) {
        let days = ((now - state.last_event_unix).max(0) as f64) / 86_400.0;
        if days <= 0.0 {
            return;
        }
        let midpoint = (self.config.min + self.config.max) / 2.0;
        let decay = self.config.decay_rate * days;
        if state.score > midpoint {
            state.score = (state.score - decay).max(midpoint);
        } else if state.score < midpoint {
            state.score = (state.score + decay).min(midpoint);
        }
    }

    /// Record a positive event for `source` at unix time `now`, applying
    /// any pending decay first, and return the resulting trust level.
    pub fn record_positive(&self, source: &str, now: i64) -> TrustLevel {
        self.record(source, now, self.config.weight_positive)
    }

    /// Record a negative event for `source` at unix time `now`, applying
    /// any pending decay first, and return the resulting trust level.
    pub fn record_negative(&self, source: &str, now: i64) -> TrustLevel {
        self.record(source, now, -self.config.weight_negative)
    }

    fn record(&self, source: &str, now: i64, delta: f64) -> TrustLevel {
        let mut sources = self.sources.lock().expect("reputation map poisoned");
        let state = sources.entry(source.to_string()).or_insert(SourceState {
            score: self.config.initial,
            events: 0,
            last_event_unix: now,
        });
        self.decay_locked(state, now);
        state.score = (state.score + delta).clamp(self.config.min, self.config.max);
        state.events = state.events.saturating_add(1);
        state.last_event_unix = now;
        self.trust_level_for(state.score, state.events)
    }

    /// Current trust level for `source` as of `now` (applying decay
    /// without mutating permanently-recorded event counts beyond the
    /// score itself).
    pub fn trust_level(&self, source: &str, now: i64) -> TrustLevel {
        let mut sources = self.sources.lock().expect("reputation map poisoned");
        match sources.get_mut(source) {
            Some(state) => {
                self.decay_locked(state, now);
                state.last_event_unix = now;
                self.trust_level_for(state.score, state.events)
            }
            None => self.trust_level_for(self.config.initial, 0),
        }
    }

    fn normalized(&self, score: f64) -> f64 {
        (score - self.config.min) / (self.config.max - self.config.min)
    }

    fn trust_level_for(&self, score: f64, events: u32) -> TrustLevel {
        let n = self.normalized(score);
        if n >= 0.8 {
            if events >= self.config.required_history {
                TrustLevel::Trusted
            } else {
                TrustLevel::Good
            }
        } else if n >= 0.6 {
            TrustLevel::Good
        } else if n >= 0.4 {
            TrustLevel::Neutral
        } else if n >= 0.2 {
            TrustLevel::Suspicious
        } else {
            TrustLevel::Untrusted
        }
    }

    /// True if `source`'s normalized score is at or below the blacklist
    /// threshold (`n <= 0.2`).
    pub fn is_blacklisted(&self, source: &str, now: i64) -> bool {
        matches!(self.trust_level(source, now), TrustLevel::Untrusted)
    }

    /// Forget sources inactive for more than a year with fewer than 10
    /// recorded events (`spec.md` §4.7.6 background sweep).
    pub fn sweep(&self, now: i64) {
        let mut sources = self.sources.lock().expect("reputation map poisoned");
        sources.retain(|_, s| !(now - s.last_event_unix > 365 * 24 * 3600 && s.events < 10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_neutral_for_unknown_source() {
        let rep = ReputationSystem::new(ReputationConfig::default());
        assert_eq!(rep.trust_level("new-peer", 0), TrustLevel::Neutral);
    }

    #[test]
    fn trusted_requires_both_score_and_history() {
        let rep = ReputationSystem::new(ReputationConfig::default());
        let mut level = TrustLevel::Neutral;
        for i in 0..30 {
            level = rep.record_positive("peer", i * 60);
        }
        assert_eq!(level, TrustLevel::Trusted);
    }

    #[test]
    fn good_score_with_insufficient_history_is_not_trusted() {
        let rep = ReputationSystem::new(ReputationConfig {
            weight_positive: 40.0,
            ..ReputationConfig::default()
        });
        let level = rep.record_positive("peer", 0);
        assert_ne!(level, TrustLevel::Trusted);
        assert_eq!(level, TrustLevel::Good);
    }

    #[test]
    fn negative_events_push_toward_blacklist() {
        let rep = ReputationSystem::new(ReputationConfig::default());
        let mut level = TrustLevel::Neutral;
        for i in 0..15 {
            level = rep.record_negative("bad-peer", i * 60);
        }
        assert!(rep.is_blacklisted("bad-peer", 15 * 60));
        assert_eq!(level, TrustLevel::Untrusted);
    }

    #[test]
    fn decay_pulls_score_back_toward_midpoint_over_time() {
        let rep = ReputationSystem::new(ReputationConfig::default());
        rep.record_positive("peer", 0);
        let level_far_future = rep.trust_level("peer", 365 * 24 * 3600);
        assert_eq!(level_far_future, TrustLevel::Neutral);
    }

    #[test]
    fn sweep_forgets_long_inactive_low_history_sources() {
        let rep = ReputationSystem::new(ReputationConfig::default());
        rep.record_positive("peer", 0);
        rep.sweep(400 * 24 * 3600);
        // A fresh lookup after the sweep should reset to the initial
        // neutral state, proving the entry was forgotten.
        assert_eq!(rep.trust_level("peer", 400 * 24 * 3600), TrustLevel::Neutral);
    }
}
