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

//! A sled-backed reference [`NoiseStore`](super::NoiseStore) implementation.
//!
//! `spec.md` §4.3 treats the backend as an external collaborator; this
//! module exists so the rest of the crate (and its tests) have a concrete,
//! local, persistent content-addressable store to run against, grounded in
//! the teacher's sled-backed `PersistentState`. CIDs are
//! `"bafy" + hex(sha256(bytes))`, which both satisfies the descriptor
//! validator's CID-prefix rule (`spec.md` §4.7.3) and gives `put`
//! idempotence for free: identical bytes always hash to the same key.

use async_trait::async_trait;

use super::{NoiseStore, StoreError};

/// A sled-backed content-addressable store.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

fn cid_for(bytes: &[u8]) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, bytes);
    format!("bafy{}", hex::encode(digest.as_ref()))
}

impl SledStore {
    /// Open (or create) a sled database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|_| StoreError::BackendUnavailable)?;
        Ok(Self { db })
    }

    /// Open a temporary, process-local database (tests and examples).
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|_| StoreError::BackendUnavailable)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl NoiseStore for SledStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let cid = cid_for(bytes);
        let db = self.db.clone();
        let key = cid.clone();
        let value = bytes.to_vec();
        tokio::task::spawn_blocking(move || db.insert(key.as_bytes(), value))
            .await
            .map_err(|_| StoreError::BackendUnavailable)?
            .map_err(|_| StoreError::BackendUnavailable)?;
        Ok(cid)
    }

    async fn get(&self, cid: &str) -> Result<Vec<u8>, StoreError> {
        let db = self.db.clone();
        let key = cid.to_string();
        let found = tokio::task::spawn_blocking(move || db.get(key.as_bytes()))
            .await
            .map_err(|_| StoreError::BackendUnavailable)?
            .map_err(|_| StoreError::BackendUnavailable)?;
        let bytes = found.ok_or(StoreError::NotFound)?.to_vec();
        if cid_for(&bytes) != cid {
            return Err(StoreError::IntegrityError);
        }
        Ok(bytes)
    }

    async fn has(&self, cid: &str) -> Result<bool, StoreError> {
        let db = self.db.clone();
        let key = cid.to_string();
        tokio::task::spawn_blocking(move || db.contains_key(key.as_bytes()))
            .await
            .map_err(|_| StoreError::BackendUnavailable)?
            .map_err(|_| StoreError::BackendUnavailable)
    }

    async fn pin(&self, _cid: &str) -> Result<(), StoreError> {
        // Local sled storage has no separate pin/GC concept; every inserted
        // key survives until explicitly removed, which this store never
        // does on its own.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_is_idempotent_and_content_addressed() {
        let store = SledStore::open_temporary().unwrap();
        let cid1 = store.put(b"hello").await.unwrap();
        let cid2 = store.put(b"hello").await.unwrap();
        assert_eq!(cid1, cid2);
        assert!(cid1.starts_with("bafy"));
    }

    #[tokio::test]
    async fn get_round_trips_and_detects_missing() {
        let store = SledStore::open_temporary().unwrap();
        let cid = store.put(b"payload").await.unwrap();
        assert!(store.has(&cid).await.unwrap());
        assert_eq!(store.get(&cid).await.unwrap(), b"payload");

        let err = store.get("bafydoesnotexist").await.unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }
}
