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

//! The NoiseFS CLI surface (`spec.md` §6 — informational, not part of the
//! core contract): `mount`, `unmount`, `list`, the index operations
//! (`show-index`, `list-files`, `add-file`, `remove-file`), and
//! `bootstrap`. Argument parsing is deliberately a flat `argv` match
//! rather than a dedicated parsing crate, per `spec.md` §1's "CLI argument
//! parsing" non-goal, mirroring the teacher's env-var-driven entrypoint.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use noisefs::announcement::discovery::spawn_discovery;
use noisefs::announcement::{spawn_gatekeeper_sweeps, AnnouncementService, DiscoveryConfig};
use noisefs::client::Client;
use noisefs::config::NodeConfig;
use noisefs::fuse::{FuseBridge, MountMode};
use noisefs::index::{FileIndex, IndexEntry};
use noisefs::storage::{NoiseStore, SledStore};

const CONFIG_PATH_ENV: &str = "NOISEFS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./noisefs.toml";

fn usage() -> &'static str {
    "usage: noisefs <mount|unmount|list|show-index|list-files|add-file|remove-file|bootstrap> [args]\n\
     \n\
     add-file <filename:cid:size>    register an existing descriptor CID under a path\n\
     remove-file <filename>          remove a path from the index\n"
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn index_path(cfg: &NodeConfig) -> PathBuf {
    PathBuf::from(&cfg.node.data_dir).join("index.bin")
}

fn backend_path(cfg: &NodeConfig) -> PathBuf {
    PathBuf::from(&cfg.node.data_dir).join("blocks")
}

fn open_index(cfg: &NodeConfig) -> anyhow::Result<FileIndex> {
    Ok(FileIndex::load(index_path(cfg))?)
}

fn open_store(cfg: &NodeConfig) -> anyhow::Result<Arc<dyn NoiseStore>> {
    let path = backend_path(cfg);
    let store = SledStore::open(path.to_string_lossy().as_ref())?;
    Ok(Arc::new(store))
}

/// `list` / `list-files` / `show-index`: every indexed path, plus
/// descriptor CID and size for `show-index`.
fn cmd_list_files(cfg: &NodeConfig, verbose: bool) -> anyhow::Result<()> {
    let index = open_index(cfg)?;
    let mut entries: Vec<(String, IndexEntry)> = index.list().into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (path, entry) in entries {
        if verbose {
            println!("{path}\t{}\t{}", entry.descriptor_cid, entry.file_size);
        } else {
            println!("{path}");
        }
    }
    Ok(())
}

/// `add-file filename:cid:size`: register an already-stored descriptor
/// CID at a logical path without going through the upload pipeline.
fn cmd_add_file(cfg: &NodeConfig, spec: &str) -> anyhow::Result<()> {
    let mut parts = spec.splitn(3, ':');
    let (filename, cid, size) = match (parts.next(), parts.next(), parts.next()) {
        (Some(f), Some(c), Some(s)) => (f, c, s),
        _ => anyhow::bail!("expected filename:cid:size, got {spec:?}"),
    };
    let file_size: u64 = size.parse()?;

    let index = open_index(cfg)?;
    index.add(
        filename,
        IndexEntry {
            descriptor_cid: cid.to_string(),
            file_size,
            modified_at: unix_now(),
        },
    );
    index.save()?;
    println!("added {filename} -> {cid} ({file_size} bytes)");
    Ok(())
}

/// `remove-file filename`: drop a path from the index. The backend is
/// untouched (`spec.md` §4.8 — orphan GC is external).
fn cmd_remove_file(cfg: &NodeConfig, filename: &str) -> anyhow::Result<()> {
    let index = open_index(cfg)?;
    match index.remove(filename) {
        Some(_) => {
            index.save()?;
            println!("removed {filename}");
            Ok(())
        }
        None => anyhow::bail!("no such entry: {filename}"),
    }
}

/// `mount`: build the client/index/FUSE bridge over the configured
/// backend and run until interrupted. The kernel-facing FUSE driver
/// itself is out of scope (`spec.md` §1); this drives the contract in
/// `noisefs::fuse` in a foreground loop so the discovery subsystem (if
/// enabled) has somewhere to publish accepted announcements.
async fn cmd_mount(cfg: NodeConfig) -> anyhow::Result<()> {
    let store = open_store(&cfg)?;
    let client = Arc::new(Client::new(store, cfg.cache.capacity));
    let index = Arc::new(open_index(&cfg)?);
    let mode = if cfg.mount.read_only {
        MountMode::ReadOnly
    } else {
        MountMode::ReadWrite
    };
    let _bridge = FuseBridge::new(index.clone(), client, mode);

    info!(mount_point = %cfg.mount.mount_point, read_only = cfg.mount.read_only, "noisefs mounted");

    let announcements = AnnouncementService::default();
    let gatekeeper = Arc::new(announcements.gatekeeper(cfg.discovery.validation_config()));
    let discovery_cfg = DiscoveryConfig {
        listen_addr: cfg.discovery.listen_addr.clone(),
        data_dir: cfg.node.data_dir.clone(),
        bootstrap: cfg.discovery.bootstrap.clone(),
        allow_peers: cfg.discovery.allow_peers.clone(),
        validation: cfg.discovery.validation_config(),
    };

    let (_handle, mut events, join) = spawn_discovery(discovery_cfg, Arc::clone(&gatekeeper))?;
    let sweeps = spawn_gatekeeper_sweeps(gatekeeper, std::time::Duration::from_secs(3600));

    let events_task = tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            info!(?ev, "discovery event");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c; unmounting");
        }
        _ = join => {
            warn!("discovery task exited unexpectedly");
        }
    }

    events_task.abort();
    sweeps.shutdown().await;
    if index.is_dirty() {
        index.save()?;
    }
    Ok(())
}

/// `bootstrap`: deliberately unimplemented. Fetching a bootstrap dataset
/// of public-domain randomizer content is an explicit non-goal of the
/// core (`spec.md` §1, "the downloader/bootstrap dataset fetcher").
fn cmd_bootstrap() -> anyhow::Result<()> {
    anyhow::bail!("bootstrap dataset fetching is outside this build's scope")
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        eprint!("{}", usage());
        std::process::exit(2);
    };

    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = match NodeConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("noisefs: failed to load config {config_path}: {e}");
            std::process::exit(1);
        }
    };

    let result: anyhow::Result<()> = match command.as_str() {
        "mount" => cmd_mount(cfg).await,
        "unmount" => {
            println!("noisefs runs mount in the foreground; stop that process (ctrl-c) to unmount");
            Ok(())
        }
        "list" | "list-files" => cmd_list_files(&cfg, false),
        "show-index" => cmd_list_files(&cfg, true),
        "add-file" => match args.get(2) {
            Some(spec) => cmd_add_file(&cfg, spec),
            None => Err(anyhow::anyhow!("add-file requires filename:cid:size")),
        },
        "remove-file" => match args.get(2) {
            Some(filename) => cmd_remove_file(&cfg, filename),
            None => Err(anyhow::anyhow!("remove-file requires a filename")),
        },
        "bootstrap" => cmd_bootstrap(),
        other => {
            eprintln!("noisefs: unknown command {other:?}\n{}", usage());
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("noisefs: {command} failed: {e}");
        std::process::exit(1);
    }
}
