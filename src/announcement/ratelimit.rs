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

//! Per-source rate limiting (`spec.md` §4.7.4): a burst bucket plus
//! minute/hour/day fixed-window buckets, each independently tripping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

/// Which bucket rejected a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    /// The short burst bucket.
    Burst,
    /// The one-minute bucket.
    Minute,
    /// The one-hour bucket.
    Hour,
    /// The one-day bucket.
    Day,
}

/// Raised when a source has exceeded one of its buckets.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("rate limit exceeded ({bucket:?}), retry after {retry_after:?}")]
pub struct RateLimitError {
    /// The bucket that tripped.
    pub bucket: Bucket,
    /// How long until that bucket resets.
    pub retry_after: Duration,
}

/// Per-bucket limits. Defaults match `spec.md` §4.7.4.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    /// Cap for the burst bucket (one-minute window, lower cap than
    /// `per_minute`).
    pub burst: u32,
    /// Cap for the rolling minute bucket.
    pub per_minute: u32,
    /// Cap for the rolling hour bucket.
    pub per_hour: u32,
    /// Cap for the rolling day bucket.
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 5,
            per_minute: 10,
            per_hour: 100,
            per_day: 500,
        }
    }
}

struct Window {
    start: std::time::Instant,
    duration: Duration,
    cap: u32,
    count: u32,
}

impl Window {
    fn new(duration: Duration, cap: u32, now: std::time::Instant) -> Self {
        Self {
            start: now,
            duration,
            cap,
            count: 0,
        }
    }

    fn retry_after(&self, now: std::time::Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.start);
        self.duration.saturating_sub(elapsed)
    }

    fn check_and_increment(&mut self, now: std::time::Instant) -> Result<(), Duration> {
        if now.saturating_duration_since(self.start) >= self.duration {
            self.start = now;
            self.count = 0;
        }
        if self.count >= self.cap {
            return Err(self.retry_after(now));
        }
        self.count += 1;
        Ok(())
    }
}

struct SourceBuckets {
    burst: Window,
    minute: Window,
    hour: Window,
    day: Window,
}

/// A per-source-id (peer id or IP) sliding-window rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    sources: Mutex<HashMap<String, SourceBuckets>>,
}

impl RateLimiter {
    /// Build a limiter with `config`.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Check `key` against all four buckets, incrementing every bucket on
    /// success. Returns the first (smallest-window) bucket that is
    /// exceeded, along with its retry-after duration.
    pub fn check(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_at(key, std::time::Instant::now())
    }

    fn check_at(&self, key: &str, now: std::time::Instant) -> Result<(), RateLimitError> {
        let mut sources = self.sources.lock().expect("rate limiter poisoned");
        let entry = sources.entry(key.to_string()).or_insert_with(|| SourceBuckets {
            burst: Window::new(Duration::from_secs(60), self.config.burst, now),
            minute: Window::new(Duration::from_secs(60), self.config.per_minute, now),
            hour: Window::new(Duration::from_secs(3600), self.config.per_hour, now),
            day: Window::new(Duration::from_secs(86_400), self.config.per_day, now),
        });

        // Check (without committing) every bucket first, so a rejection
        // at the day bucket doesn't still burn a burst/minute slot.
        let checks: [(Bucket, &Window); 4] = [
            (Bucket::Burst, &entry.burst),
            (Bucket::Minute, &entry.minute),
            (Bucket::Hour, &entry.hour),
            (Bucket::Day, &entry.day),
        ];
        for (bucket, window) in checks {
            let would_reset = now.saturating_duration_since(window.start) >= window.duration;
            if !would_reset && window.count >= window.cap {
                return Err(RateLimitError {
                    bucket,
                    retry_after: window.retry_after(now),
                });
            }
        }

        entry.burst.check_and_increment(now).map_err(|retry_after| RateLimitError {
            bucket: Bucket::Burst,
            retry_after,
        })?;
        entry.minute.check_and_increment(now).map_err(|retry_after| RateLimitError {
            bucket: Bucket::Minute,
            retry_after,
        })?;
        entry.hour.check_and_increment(now).map_err(|retry_after| RateLimitError {
            bucket: Bucket::Hour,
            retry_after,
        })?;
        entry.day.check_and_increment(now).map_err(|retry_after| RateLimitError {
            bucket: Bucket::Day,
            retry_after,
        })?;
        Ok(())
    }

    /// Drop bookkeeping for sources idle past their day window, bounding
    /// memory for long-running processes (`spec.md` §9 background sweep).
    pub fn cleanup(&self, now: std::time::Instant) {
        let mut sources = self.sources.lock().expect("rate limiter poisoned");
        sources.retain(|_, b| now.saturating_duration_since(b.day.start) < Duration::from_secs(86_400));
    }
}
