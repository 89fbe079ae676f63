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

//! Announcement discovery (`spec.md` §4.7.9): gossipsub publish/subscribe
//! keyed by topic hash, with every inbound message run through the
//! validator, rate limiter, spam detector, and reputation system before
//! it reaches the local [`super::store::AnnouncementStore`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use libp2p::{
    core::upgrade,
    gossipsub::{self, IdentTopic, MessageAuthenticity},
    identify, noise, ping,
    swarm::{Config as SwarmConfig, NetworkBehaviour, Swarm, SwarmEvent},
    tcp, yamux, Multiaddr, PeerId, Transport,
};

use libp2p::futures::StreamExt;

use super::ratelimit::RateLimiter;
use super::reputation::ReputationSystem;
use super::spam::SpamDetector;
use super::store::AnnouncementStore;
use super::types::Announcement;
use super::validation::{AnnouncementValidator, ValidationConfig};

/// Events surfaced to a caller driving the discovery loop.
#[derive(Clone, Debug)]
pub enum DiscoveryEvent {
    /// A peer connected.
    PeerConnected(PeerId),
    /// A peer disconnected.
    PeerDisconnected(PeerId),
    /// An announcement passed every check and was accepted into the
    /// local store.
    Accepted(Box<Announcement>),
    /// An announcement was rejected, and why (for observability only;
    /// the sender is not told).
    Rejected {
        /// The peer the announcement arrived from.
        source: PeerId,
        /// Short machine-readable reason.
        reason: String,
    },
}

/// Receiver of [`DiscoveryEvent`]s.
pub type EventRx = mpsc::Receiver<DiscoveryEvent>;

/// Errors starting the discovery subsystem.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A filesystem operation (identity persistence) failed.
    #[error("io error setting up discovery")]
    Io,
    /// The listen address, a bootstrap address, or the gossipsub config
    /// was invalid.
    #[error("invalid discovery configuration")]
    Config,
}

/// Runtime configuration for the discovery subsystem.
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Listen multiaddr, e.g. `"/ip4/0.0.0.0/tcp/4001"`.
    pub listen_addr: String,
    /// Directory holding the persistent libp2p identity.
    pub data_dir: String,
    /// Peers to dial on startup.
    pub bootstrap: Vec<String>,
    /// If non-empty, only these peers are kept connected.
    pub allow_peers: Vec<String>,
    /// Validator configuration applied to every inbound announcement.
    pub validation: ValidationConfig,
}

/// Handle for publishing announcements into the swarm; inbound,
/// already-vetted announcements arrive as [`DiscoveryEvent::Accepted`]
/// on the paired [`EventRx`].
pub struct DiscoveryHandle {
    outbound_tx: mpsc::Sender<(String, Announcement)>,
}

impl DiscoveryHandle {
    /// Publish `ann` under the gossipsub topic keyed by `topic_hash`.
    pub async fn publish(&self, topic_hash: String, ann: Announcement) -> Result<(), DiscoveryError> {
        self.outbound_tx
            .send((topic_hash, ann))
            .await
            .map_err(|_| DiscoveryError::Io)
    }
}

#[derive(Debug)]
enum BehaviourEvent {
    Gossipsub(gossipsub::Event),
    Identify(()),
    Ping(()),
}
impl From<gossipsub::Event> for BehaviourEvent {
    fn from(e: gossipsub::Event) -> Self {
        Self::Gossipsub(e)
    }
}
impl From<identify::Event> for BehaviourEvent {
    fn from(_e: identify::Event) -> Self {
        Self::Identify(())
    }
}
impl From<ping::Event> for BehaviourEvent {
    fn from(_e: ping::Event) -> Self {
        Self::Ping(())
    }
}

#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "BehaviourEvent")]
struct Behaviour {
    gossipsub: gossipsub::Behaviour,
    identify: identify::Behaviour,
    ping: ping::Behaviour,
}

fn ensure_dir(path: &str) -> Result<(), DiscoveryError> {
    let p = Path::new(path);
    if !p.exists() {
        std::fs::create_dir_all(p).map_err(|_| DiscoveryError::Io)?;
    }
    Ok(())
}

/// The shared state every inbound message is checked against before it
/// is admitted to the store.
pub struct Gatekeeper {
    validator: AnnouncementValidator,
    rate_limiter: RateLimiter,
    spam_detector: SpamDetector,
    reputation: ReputationSystem,
    store: Arc<AnnouncementStore>,
}

impl Gatekeeper {
    /// Build a gatekeeper wrapping `store`, with the other checks at
    /// their spec defaults.
    pub fn new(store: Arc<AnnouncementStore>, validation: ValidationConfig) -> Self {
        Self {
            validator: AnnouncementValidator::new(validation),
            rate_limiter: RateLimiter::new(Default::default()),
            spam_detector: SpamDetector::default(),
            reputation: ReputationSystem::new(Default::default()),
            store,
        }
    }

    /// Run `ann`, received from `source`, through rate limiting,
    /// structural validation, spam detection, and reputation, admitting
    /// it to the store only if every check passes.
    pub fn admit(&self, source: &str, ann: Announcement, now: i64) -> Result<(), String> {
        if let Err(e) = self.rate_limiter.check(source) {
            self.reputation.record_negative(source, now);
            return Err(format!("rate limited: {e}"));
        }
        if let Err(e) = self.validator.validate(&ann, now) {
            self.reputation.record_negative(source, now);
            return Err(format!("invalid: {e}"));
        }
        if let Some(reason) = self.spam_detector.classify(&ann, now) {
            self.reputation.record_negative(source, now);
            return Err(format!("spam: {reason:?}"));
        }
        if self.reputation.is_blacklisted(source, now) {
            return Err("source blacklisted".to_string());
        }
        self.reputation.record_positive(source, now);
        self.store.add(ann, now);
        Ok(())
    }

    /// Run every component's periodic maintenance: purge aged rate-limit
    /// buckets, aged spam-tracking entries, long-inactive reputation
    /// records, and expired store entries (`spec.md` §9 "background
    /// sweeps as goroutines" — modeled here as one call a periodic task
    /// invokes, rather than each component managing its own timer).
    pub fn cleanup(&self, now: i64) -> usize {
        self.rate_limiter.cleanup(std::time::Instant::now());
        self.spam_detector.cleanup(now);
        self.reputation.sweep(now);
        self.store.cleanup(now)
    }
}

/// Spawn the discovery subsystem: a libp2p swarm publishing and
/// subscribing to announcements, with every inbound message passed
/// through `gatekeeper` before being surfaced as a [`DiscoveryEvent`].
pub fn spawn_discovery(
    cfg: DiscoveryConfig,
    gatekeeper: Arc<Gatekeeper>,
) -> Result<(DiscoveryHandle, EventRx, tokio::task::JoinHandle<()>), DiscoveryError> {
    ensure_dir(&cfg.data_dir)?;

    let (local_peer_id, id_keys) =
        crate::identity::load_or_create_identity(&cfg.data_dir).map_err(|_| DiscoveryError::Io)?;

    let mut allow_set: HashSet<PeerId> = HashSet::new();
    for s in cfg.allow_peers.iter().map(|x| x.trim()).filter(|x| !x.is_empty()) {
        match s.parse::<PeerId>() {
            Ok(pid) => {
                allow_set.insert(pid);
            }
            Err(_) => warn!(peer = %s, "invalid allow_peers entry; ignoring"),
        }
    }

    let (out_tx, mut out_rx) = mpsc::channel::<(String, Announcement)>(1024);
    let (ev_tx, ev_rx) = mpsc::channel::<DiscoveryEvent>(1024);

    let listen_addr = cfg.listen_addr.clone();
    let bootstrap = cfg.bootstrap.clone();

    let join = tokio::spawn(async move {
        let noise_keys = match noise::Config::new(&id_keys) {
            Ok(v) => v,
            Err(_) => {
                warn!("failed to build noise config");
                return;
            }
        };

        let transport = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true))
            .upgrade(upgrade::Version::V1)
            .authenticate(noise_keys)
            .multiplex(yamux::Config::default())
            .boxed();

        let gcfg = gossipsub::ConfigBuilder::default()
            .validation_mode(gossipsub::ValidationMode::Permissive)
            .heartbeat_interval(Duration::from_secs(1))
            .build()
            .unwrap_or_else(|_| gossipsub::Config::default());

        let gossipsub =
            match gossipsub::Behaviour::new(MessageAuthenticity::Signed(id_keys.clone()), gcfg) {
                Ok(v) => v,
                Err(_) => {
                    warn!("failed to create gossipsub behaviour");
                    return;
                }
            };

        let identify = identify::Behaviour::new(identify::Config::new(
            "noisefs/1.0.0".to_string(),
            id_keys.public(),
        ));

        let ping = ping::Behaviour::new(
            ping::Config::new()
                .with_interval(Duration::from_secs(10))
                .with_timeout(Duration::from_secs(20)),
        );

        let behaviour = Behaviour { gossipsub, identify, ping };
        let mut swarm = Swarm::new(transport, behaviour, local_peer_id, SwarmConfig::with_tokio_executor());

        let listen: Multiaddr = match listen_addr.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(addr = %listen_addr, "bad listen_addr");
                return;
            }
        };
        if let Err(e) = swarm.listen_on(listen) {
            warn!(err = ?e, "listen_on failed");
            return;
        }

        for b in bootstrap.iter().map(|x| x.trim()).filter(|x| !x.is_empty()) {
            match b.parse::<Multiaddr>() {
                Ok(ma) => {
                    if let Err(e) = swarm.dial(ma.clone()) {
                        warn!(boot = %b, err = ?e, "dial bootstrap failed");
                    } else {
                        info!(boot = %b, "dialing bootstrap");
                    }
                }
                Err(_) => warn!(boot = %b, "bad bootstrap addr; skipping"),
            }
        }

        info!(%local_peer_id, "announcement discovery loop started");

        loop {
            tokio::select! {
                maybe_msg = out_rx.recv() => {
                    match maybe_msg {
                        Some((topic_hash, ann)) => {
                            let topic = IdentTopic::new(topic_hash);
                            match ann.to_bytes() {
                                Ok(bytes) => {
                                    if swarm.behaviour().gossipsub.mesh_peers(&topic.hash()).next().is_none() {
                                        let _ = swarm.behaviour_mut().gossipsub.subscribe(&topic);
                                    }
                                    if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic, bytes) {
                                        warn!(err = ?e, "gossipsub publish failed");
                                    }
                                }
                                Err(e) => warn!(err = ?e, "failed to encode announcement"),
                            }
                        }
                        None => {
                            warn!("outbound channel closed; stopping discovery task");
                            break;
                        }
                    }
                }

                ev = swarm.select_next_some() => {
                    match ev {
                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr = %address, "listening");
                        }
                        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                            if !allow_set.is_empty() && !allow_set.contains(&peer_id) {
                                warn!(%peer_id, "peer not in allowlist; disconnecting");
                                let _ = swarm.disconnect_peer_id(peer_id);
                                continue;
                            }
                            let _ = ev_tx.send(DiscoveryEvent::PeerConnected(peer_id)).await;
                        }
                        SwarmEvent::ConnectionClosed { peer_id, .. } => {
                            let _ = ev_tx.send(DiscoveryEvent::PeerDisconnected(peer_id)).await;
                        }
                        SwarmEvent::Behaviour(BehaviourEvent::Gossipsub(gossipsub::Event::Message {
                            propagation_source,
                            message,
                            ..
                        })) => {
                            if !allow_set.is_empty() && !allow_set.contains(&propagation_source) {
                                continue;
                            }
                            match Announcement::from_bytes(&message.data) {
                                Ok(ann) => {
                                    let now = unix_now();
                                    match gatekeeper.admit(&propagation_source.to_string(), ann.clone(), now) {
                                        Ok(()) => {
                                            let _ = ev_tx.send(DiscoveryEvent::Accepted(Box::new(ann))).await;
                                        }
                                        Err(reason) => {
                                            let _ = ev_tx
                                                .send(DiscoveryEvent::Rejected { source: propagation_source, reason })
                                                .await;
                                        }
                                    }
                                }
                                Err(_) => {
                                    let _ = ev_tx
                                        .send(DiscoveryEvent::Rejected {
                                            source: propagation_source,
                                            reason: "malformed announcement".to_string(),
                                        })
                                        .await;
                                }
                            }
                        }
                        SwarmEvent::Behaviour(BehaviourEvent::Identify(_)) => {}
                        SwarmEvent::Behaviour(BehaviourEvent::Ping(_)) => {}
                        _ => {}
                    }
                }
            }
        }
    });

    Ok((DiscoveryHandle { outbound_tx: out_tx }, ev_rx, join))
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
