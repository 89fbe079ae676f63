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

//! Prometheus metrics for the block pipeline, cache, and announcement
//! subsystem (`spec.md` §9 observability).

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric failed to construct or register with the registry.
    #[error("prometheus")]
    Prom,
}

/// Metrics container, shared across the client core, discovery layer, and
/// CLI surface.
#[derive(Clone)]
pub struct Metrics {
    /// Registry all metrics below are registered against.
    pub registry: Registry,

    /// Resident block cache hits.
    pub cache_hits_total: IntCounter,
    /// Resident block cache misses.
    pub cache_misses_total: IntCounter,
    /// Blocks currently resident in the cache.
    pub cache_resident_blocks: IntGauge,

    /// Blocks uploaded (anonymized and stored) by the client core.
    pub blocks_uploaded_total: IntCounter,
    /// Blocks downloaded and reconstructed by the client core.
    pub blocks_downloaded_total: IntCounter,
    /// Randomizer blocks synthesized rather than reused from the pool.
    pub randomizers_synthesized_total: IntCounter,

    /// Announcements accepted by the gatekeeper.
    pub announcements_accepted_total: IntCounter,
    /// Announcements rejected for failing structural/signature validation.
    pub announcements_invalid_total: IntCounter,
    /// Announcements rejected for exceeding a rate limit.
    pub announcements_rate_limited_total: IntCounter,
    /// Announcements rejected by the spam detector.
    pub announcements_spam_total: IntCounter,
    /// Announcements rejected because their source was blacklisted.
    pub announcements_blacklisted_total: IntCounter,

    /// Currently connected discovery-layer peers.
    pub discovery_peers: IntGauge,
}

impl Metrics {
    /// Create and register every metric against a fresh [`Registry`].
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let cache_hits_total = IntCounter::new("noisefs_cache_hits_total", "Block cache hits")
            .map_err(|_| MetricsError::Prom)?;
        let cache_misses_total = IntCounter::new("noisefs_cache_misses_total", "Block cache misses")
            .map_err(|_| MetricsError::Prom)?;
        let cache_resident_blocks = IntGauge::new(
            "noisefs_cache_resident_blocks",
            "Blocks currently resident in the cache",
        )
        .map_err(|_| MetricsError::Prom)?;

        let blocks_uploaded_total = IntCounter::new(
            "noisefs_blocks_uploaded_total",
            "Blocks anonymized and stored",
        )
        .map_err(|_| MetricsError::Prom)?;
        let blocks_downloaded_total = IntCounter::new(
            "noisefs_blocks_downloaded_total",
            "Blocks fetched and reconstructed",
        )
        .map_err(|_| MetricsError::Prom)?;
        let randomizers_synthesized_total = IntCounter::new(
            "noisefs_randomizers_synthesized_total",
            "Randomizer blocks synthesized rather than reused",
        )
        .map_err(|_| MetricsError::Prom)?;

        let announcements_accepted_total = IntCounter::new(
            "noisefs_announcements_accepted_total",
            "Announcements accepted by the gatekeeper",
        )
        .map_err(|_| MetricsError::Prom)?;
        let announcements_invalid_total = IntCounter::new(
            "noisefs_announcements_invalid_total",
            "Announcements rejected for failing validation",
        )
        .map_err(|_| MetricsError::Prom)?;
        let announcements_rate_limited_total = IntCounter::new(
            "noisefs_announcements_rate_limited_total",
            "Announcements rejected for exceeding a rate limit",
        )
        .map_err(|_| MetricsError::Prom)?;
        let announcements_spam_total = IntCounter::new(
            "noisefs_announcements_spam_total",
            "Announcements rejected by the spam detector",
        )
        .map_err(|_| MetricsError::Prom)?;
        let announcements_blacklisted_total = IntCounter::new(
            "noisefs_announcements_blacklisted_total",
            "Announcements rejected because their source was blacklisted",
        )
        .map_err(|_| MetricsError::Prom)?;

        let discovery_peers = IntGauge::new("noisefs_discovery_peers", "Connected discovery peers")
            .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(cache_hits_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(cache_misses_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(cache_resident_blocks.clone()))
            .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(blocks_uploaded_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(blocks_downloaded_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(randomizers_synthesized_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(announcements_accepted_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(announcements_invalid_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(announcements_rate_limited_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(announcements_spam_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(announcements_blacklisted_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(discovery_peers.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            cache_hits_total,
            cache_misses_total,
            cache_resident_blocks,
            blocks_uploaded_total,
            blocks_downloaded_total,
            randomizers_synthesized_total,
            announcements_accepted_total,
            announcements_invalid_total,
            announcements_rate_limited_total,
            announcements_spam_total,
            announcements_blacklisted_total,
            discovery_peers,
        })
    }
}
