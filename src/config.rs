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

//! Plain, `serde`-deserializable node configuration (`spec.md` §6
//! "environment configuration"). Loaded by the CLI layer and passed to
//! the rest of the crate by value; nothing here is a global singleton.

use serde::{Deserialize, Serialize};

use crate::announcement::ValidationConfig;

/// Top-level configuration for a single NoiseFS node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Local node settings.
    pub node: NodeSettings,
    /// FUSE mount settings.
    pub mount: MountSettings,
    /// Discovery (gossipsub) settings.
    pub discovery: DiscoverySettings,
    /// Block cache settings.
    pub cache: CacheSettings,
}

/// Local node identity and data directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Human-readable name, used only in logs.
    pub name: String,
    /// Directory holding the backend, the index, and the persisted
    /// libp2p identity.
    pub data_dir: String,
}

/// FUSE mount configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MountSettings {
    /// Path the filesystem is mounted at.
    pub mount_point: String,
    /// `true` rejects `write`/`unlink` at the bridge.
    #[serde(default)]
    pub read_only: bool,
}

/// Discovery (gossipsub) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Listen multiaddr, e.g. `"/ip4/0.0.0.0/tcp/4001"`.
    pub listen_addr: String,
    /// Peers to dial on startup.
    #[serde(default)]
    pub bootstrap: Vec<String>,
    /// Allowlist of peer IDs; empty means allow all.
    #[serde(default)]
    pub allow_peers: Vec<String>,
    /// Require a valid signature on every inbound announcement.
    #[serde(default)]
    pub require_signatures: bool,
}

impl DiscoverySettings {
    /// Build the validator configuration this setting implies.
    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            require_signatures: self.require_signatures,
        }
    }
}

/// Block cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of resident blocks.
    pub capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                name: "noisefs-node".to_string(),
                data_dir: "./data".to_string(),
            },
            mount: MountSettings {
                mount_point: "./mnt".to_string(),
                read_only: false,
            },
            discovery: DiscoverySettings {
                listen_addr: "/ip4/0.0.0.0/tcp/4001".to_string(),
                bootstrap: Vec::new(),
                allow_peers: Vec::new(),
                require_signatures: false,
            },
            cache: CacheSettings { capacity: 256 },
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file at `path`, falling back to
    /// [`NodeConfig::default`] if it does not exist.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if !std::path::Path::new(path).exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let cfg = toml::from_str(&raw)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = NodeConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.node.name, cfg.node.name);
        assert_eq!(parsed.cache.capacity, cfg.cache.capacity);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let cfg = NodeConfig::load("/nonexistent/path/noisefs.toml").unwrap();
        assert_eq!(cfg.node.data_dir, "./data");
    }
}
