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

//! The client core (`spec.md` §4.5): orchestrates the OFFSystem 3-tuple
//! pipeline end to end — randomizer selection, XOR, backend storage, and
//! the upload/download state machines — with the concurrency discipline
//! of §4.5.2 (at-most-once build per fingerprint, at-most-once fetch per
//! CID) and the retry/backoff rules of §4.5.5.

pub mod randomizer;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, instrument, warn};

use crate::block::{self, xor3, Block, DEFAULT_BLOCK_SIZE};
use crate::cache::BlockCache;
use crate::codec::Hash32;
use crate::descriptor::{Descriptor, Triple};
use crate::error::{BackoffPolicy, ErrorClass, NoiseFsError};
use crate::storage::{NoiseStore, StoreError};
use randomizer::RandomizerPool;

/// Runs a fallible backend operation under the crate's standard backoff
/// policy, retrying only while the error classifies as transient.
async fn with_backoff<F, Fut, T>(policy: &BackoffPolicy, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, ?delay, error = %e, "retrying transient backend error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Coalesces concurrent calls that share a key into a single execution of
/// the underlying work, per `spec.md` §4.5.2. Each distinct key gets at
/// most one in-flight future at a time; late joiners await the same
/// result rather than redoing the work.
struct Coalescer<K, V> {
    inflight: Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    async fn run<F, Fut>(&self, key: K, f: F) -> Arc<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = V>,
    {
        let cell = {
            let mut guard = self.inflight.lock().await;
            guard
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell.get_or_init(|| async { Arc::new(f().await) }).await.clone();

        let mut guard = self.inflight.lock().await;
        if let Some(existing) = guard.get(&key) {
            if Arc::ptr_eq(existing, &cell) {
                guard.remove(&key);
            }
        }
        result
    }
}

/// Orchestrates uploads and downloads against a single backend, cache,
/// and randomizer pool.
pub struct Client {
    store: Arc<dyn NoiseStore>,
    cache: Arc<BlockCache>,
    randomizer: RandomizerPool,
    backoff: BackoffPolicy,
    build_coalescer: Coalescer<[u8; 32], Result<Triple, String>>,
    fetch_coalescer: Coalescer<String, Result<Vec<u8>, StoreError>>,
}

impl Client {
    /// Build a client over `store`, with a cache of `cache_capacity`
    /// resident blocks.
    pub fn new(store: Arc<dyn NoiseStore>, cache_capacity: usize) -> Self {
        let cache = BlockCache::new(cache_capacity);
        Self {
            store: store.clone(),
            cache: cache.clone(),
            randomizer: RandomizerPool::new(store, cache),
            backoff: BackoffPolicy::default(),
            build_coalescer: Coalescer::new(),
            fetch_coalescer: Coalescer::new(),
        }
    }

    /// Upload state machine for a single block (`spec.md` §4.5.3):
    /// `Idle → Fingerprinted → RandomizersChosen → XORed → Stored →
    /// TripleRecorded`. Concurrent uploads of an identical block coalesce
    /// onto one build.
    #[instrument(skip(self, original))]
    pub async fn upload_block(&self, original: &Block) -> Result<Triple, NoiseFsError> {
        let fingerprint = *Hash32::digest(original.as_bytes()).as_bytes();
        let original = original.clone();
        let store = self.store.clone();
        let backoff = self.backoff;
        let randomizer = &self.randomizer;

        let result = self
            .build_coalescer
            .run(fingerprint, move || async move {
                Self::build_triple(&original, randomizer, &store, &backoff)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await;

        match &*result {
            Ok(triple) => Ok(triple.clone()),
            Err(msg) => {
                debug!(error = %msg, "upload build failed");
                Err(NoiseFsError::BuildFailed(msg.clone()))
            }
        }
    }

    async fn build_triple(
        original: &Block,
        randomizer: &RandomizerPool,
        store: &Arc<dyn NoiseStore>,
        backoff: &BackoffPolicy,
    ) -> Result<Triple, NoiseFsError> {
        let (r1, rand1_cid, r2, rand2_cid) = randomizer.select_pair(original).await?;
        let anonymized = xor3(original, &r1, &r2)?;
        let bytes = anonymized.into_bytes();
        let data_cid = with_backoff(backoff, || {
            let store = store.clone();
            let bytes = bytes.clone();
            async move { store.put(&bytes).await }
        })
        .await
        .map_err(NoiseFsError::Storage)?;

        let triple = Triple {
            data_cid,
            rand1_cid,
            rand2_cid,
        };
        Ok(triple)
    }

    /// Download state machine for a single block (`spec.md` §4.5.4):
    /// fans out three concurrent fetches (one data, two randomizers),
    /// waits for all, then reconstructs via `xor3`. Concurrent fetches of
    /// the same CID coalesce onto one backend round-trip.
    #[instrument(skip(self))]
    pub async fn download_block(&self, triple: &Triple) -> Result<Block, NoiseFsError> {
        let (data, r1, r2) = tokio::try_join!(
            self.fetch(&triple.data_cid),
            self.fetch(&triple.rand1_cid),
            self.fetch(&triple.rand2_cid),
        )?;
        let block = xor3(&Block::new(data), &Block::new(r1), &Block::new(r2))?;
        Ok(block)
    }

    async fn fetch(&self, cid: &str) -> Result<Vec<u8>, NoiseFsError> {
        if let Some(block) = self.cache.get(cid) {
            return Ok(block.into_bytes());
        }
        let store = self.store.clone();
        let backoff = self.backoff;
        let cid_owned = cid.to_string();

        let result = self
            .fetch_coalescer
            .run(cid_owned.clone(), move || async move {
                with_backoff(&backoff, || {
                    let store = store.clone();
                    let cid = cid_owned.clone();
                    async move { store.get(&cid).await }
                })
                .await
            })
            .await;

        match &*result {
            Ok(bytes) => {
                self.cache.put(cid.to_string(), Block::new(bytes.clone()));
                Ok(bytes.clone())
            }
            Err(e) => Err(NoiseFsError::Storage(e.clone())),
        }
    }

    /// Upload an entire file: split into blocks of `DEFAULT_BLOCK_SIZE`,
    /// build a triple per block, and assemble (but do not publish
    /// anywhere — that is the caller's concern) the descriptor. Per
    /// `spec.md` §5, the descriptor only becomes valid for publication
    /// once every triple has been recorded.
    pub async fn upload_file(
        &self,
        filename: impl Into<String>,
        bytes: &[u8],
        created_at: i64,
    ) -> Result<Descriptor, NoiseFsError> {
        let block_size = DEFAULT_BLOCK_SIZE;
        let blocks = block::split(bytes, block_size)?;
        let mut descriptor = Descriptor::new(filename, bytes.len() as u64, block_size as u64, created_at);

        for block in &blocks {
            let triple = self.upload_block(block).await?;
            descriptor.add_triple(triple.data_cid, triple.rand1_cid, triple.rand2_cid)?;
        }

        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Download an entire file by resolving and reconstructing every
    /// triple in `descriptor`, in order, then truncating to the recorded
    /// `file_size`.
    pub async fn download_file(&self, descriptor: &Descriptor) -> Result<Vec<u8>, NoiseFsError> {
        descriptor.validate()?;
        let mut blocks = Vec::with_capacity(descriptor.blocks.len());
        for triple in &descriptor.blocks {
            blocks.push(self.download_block(triple).await?);
        }
        Ok(block::reconstruct(&blocks, descriptor.file_size))
    }

    /// Serialize `descriptor` and store it directly in the backend,
    /// returning its content address (`spec.md` §4.5.1, "serialize
    /// descriptor, store as another block, obtain descriptor CID"). The
    /// descriptor itself is not XOR-anonymized: unlike file content
    /// blocks, it is already the thing an announcement deliberately
    /// makes discoverable, so there is no plausible-deniability property
    /// to preserve here.
    pub async fn publish_descriptor(&self, descriptor: &Descriptor) -> Result<String, NoiseFsError> {
        let bytes = descriptor.to_bytes()?;
        with_backoff(&self.backoff, || {
            let store = self.store.clone();
            let bytes = bytes.clone();
            async move { store.put(&bytes).await }
        })
        .await
        .map_err(NoiseFsError::Storage)
    }

    /// Fetch a descriptor's raw bytes by its CID, for the caller to parse
    /// with [`Descriptor::from_bytes`].
    pub async fn download_descriptor(&self, descriptor_cid: &str) -> Result<Vec<u8>, NoiseFsError> {
        with_backoff(&self.backoff, || {
            let store = self.store.clone();
            let cid = descriptor_cid.to_string();
            async move { store.get(&cid).await }
        })
        .await
        .map_err(NoiseFsError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SledStore;

    fn client() -> Client {
        let store: Arc<dyn NoiseStore> = Arc::new(SledStore::open_temporary().unwrap());
        Client::new(store, 256)
    }

    #[tokio::test]
    async fn upload_then_download_round_trips_small_file() {
        let client = client();
        let payload = b"TOP SECRET".repeat(50);
        let descriptor = client.upload_file("secret.txt", &payload, 1_700_000_000).await.unwrap();
        assert_eq!(descriptor.blocks.len(), 1);

        let recovered = client.download_file(&descriptor).await.unwrap();
        assert_eq!(recovered, payload);
    }

    #[tokio::test]
    async fn upload_then_download_round_trips_multi_block_file() {
        let client = client();
        let payload: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let descriptor = client.upload_file("movie.mkv", &payload, 1_700_000_000).await.unwrap();
        assert_eq!(descriptor.blocks.len(), 3);

        let recovered = client.download_file(&descriptor).await.unwrap();
        assert_eq!(recovered, payload);
    }

    #[tokio::test]
    async fn anonymized_blocks_never_reveal_plaintext() {
        let client = client();
        let payload = b"TOP SECRET PLAINTEXT".to_vec();
        let descriptor = client.upload_file("f", &payload, 0).await.unwrap();
        for triple in &descriptor.blocks {
            let bytes = client.store.get(&triple.data_cid).await.unwrap();
            let haystack = String::from_utf8_lossy(&bytes);
            assert!(!haystack.contains("TOP SECRET"));
        }
    }

    #[tokio::test]
    async fn concurrent_uploads_of_identical_content_coalesce() {
        let client = Arc::new(client());
        let payload = Block::new(vec![0xABu8; 4096]);

        let c1 = client.clone();
        let b1 = payload.clone();
        let c2 = client.clone();
        let b2 = payload.clone();

        let (t1, t2) = tokio::join!(
            tokio::spawn(async move { c1.upload_block(&b1).await.unwrap() }),
            tokio::spawn(async move { c2.upload_block(&b2).await.unwrap() }),
        );
        assert_eq!(t1.unwrap(), t2.unwrap());
    }
}
