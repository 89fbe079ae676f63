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

//! The FUSE bridge *contract* (`spec.md` §4.8): only the seam between a
//! mounted filesystem and the [`crate::index`]/[`crate::client`] layers
//! is in scope, not an actual kernel-level FUSE driver (`spec.md` §2
//! Non-goals) or posix-completeness beyond regular files in a flat or
//! hierarchical namespace.

use std::sync::Arc;

use crate::client::Client;
use crate::descriptor::Descriptor;
use crate::error::NoiseFsError;
use crate::index::{FileIndex, IndexEntry};

/// Display metadata for a path, as returned by [`FuseBridge::lookup`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    /// The descriptor CID backing this path.
    pub descriptor_cid: String,
    /// Original file size in bytes.
    pub file_size: u64,
    /// Unix seconds the entry was added or last updated.
    pub modified_at: i64,
}

/// Whether mutating calls are permitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountMode {
    /// `write`/`unlink` are serviced normally.
    ReadWrite,
    /// `write`/`unlink` are rejected with
    /// [`NoiseFsError::ReadOnlyFilesystem`].
    ReadOnly,
}

/// The bridge between a mounted filesystem and the index/client layers.
/// Owns no kernel-facing state; a real FUSE driver would call through
/// this type from its lookup/write/unlink/readdir callbacks.
pub struct FuseBridge {
    index: Arc<FileIndex>,
    client: Arc<Client>,
    mode: MountMode,
}

impl FuseBridge {
    /// Build a bridge over `index` and `client`, operating in `mode`.
    pub fn new(index: Arc<FileIndex>, client: Arc<Client>, mode: MountMode) -> Self {
        Self { index, client, mode }
    }

    fn require_read_write(&self) -> Result<(), NoiseFsError> {
        match self.mode {
            MountMode::ReadWrite => Ok(()),
            MountMode::ReadOnly => Err(NoiseFsError::ReadOnlyFilesystem),
        }
    }

    /// `lookup(path)`: resolve `path` through the index to its
    /// descriptor CID, fetch the descriptor, and return display
    /// metadata. File contents are not read here; they are served lazily
    /// by [`FuseBridge::read`] (`spec.md` §4.5.4).
    pub async fn lookup(&self, path: &str) -> Result<FileMetadata, NoiseFsError> {
        let entry = self
            .index
            .lookup(path)
            .ok_or_else(|| NoiseFsError::Index(crate::error::IndexError::Format))?;
        Ok(FileMetadata {
            descriptor_cid: entry.descriptor_cid,
            file_size: entry.file_size,
            modified_at: entry.modified_at,
        })
    }

    /// Read the full contents of the file at `path`, by resolving its
    /// descriptor and running the download path.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>, NoiseFsError> {
        let meta = self.lookup(path).await?;
        let descriptor_bytes = self.client.download_descriptor(&meta.descriptor_cid).await?;
        let descriptor = Descriptor::from_bytes(&descriptor_bytes)?;
        self.client.download_file(&descriptor).await
    }

    /// `write(path, bytes)`: buffer `bytes` (already fully assembled by
    /// the caller, mirroring the "buffers in memory until close"
    /// contract) and invoke the upload path. On success, records
    /// `index.add`; on failure, the index is left untouched — a partial
    /// write at the backend never produces an index entry.
    pub async fn write(&self, path: &str, bytes: &[u8], now: i64) -> Result<(), NoiseFsError> {
        self.require_read_write()?;
        let descriptor = self.client.upload_file(path, bytes, now).await?;
        let descriptor_cid = self.client.publish_descriptor(&descriptor).await?;
        self.index.add(
            path,
            IndexEntry {
                descriptor_cid,
                file_size: descriptor.file_size,
                modified_at: now,
            },
        );
        Ok(())
    }

    /// `unlink(path)`: remove the index entry. The backend is not told;
    /// garbage collection of now-orphaned blocks is external to this
    /// crate (`spec.md` §4.8).
    pub fn unlink(&self, path: &str) -> Result<(), NoiseFsError> {
        self.require_read_write()?;
        self.index.remove(path);
        Ok(())
    }

    /// `readdir(dir)`: every indexed path with prefix `dir`.
    pub fn readdir(&self, dir: &str) -> Vec<String> {
        let prefix = if dir.is_empty() || dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };
        let mut matched: Vec<String> = self
            .index
            .list()
            .into_keys()
            .filter(|p| p.starts_with(&prefix))
            .collect();
        matched.sort();
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NoiseStore, SledStore};
    use tempfile::tempdir;

    fn bridge(mode: MountMode) -> FuseBridge {
        let dir = tempdir().unwrap();
        let store: Arc<dyn NoiseStore> = Arc::new(SledStore::open_temporary().unwrap());
        let client = Arc::new(Client::new(store, 64));
        let index = Arc::new(FileIndex::load(dir.path().join("index.bin")).unwrap());
        FuseBridge::new(index, client, mode)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let b = bridge(MountMode::ReadWrite);
        b.write("/movies/a.mp4", b"hello world".repeat(20).as_slice(), 1000)
            .await
            .unwrap();
        let meta = b.lookup("/movies/a.mp4").await.unwrap();
        assert_eq!(meta.file_size, 220);
        let data = b.read("/movies/a.mp4").await.unwrap();
        assert_eq!(data, b"hello world".repeat(20));
    }

    #[tokio::test]
    async fn unlink_removes_from_index() {
        let b = bridge(MountMode::ReadWrite);
        b.write("/a", b"content", 1000).await.unwrap();
        b.unlink("/a").unwrap();
        assert!(b.lookup("/a").await.is_err());
    }

    #[tokio::test]
    async fn readdir_filters_by_prefix() {
        let b = bridge(MountMode::ReadWrite);
        b.write("/movies/a.mp4", b"a", 1000).await.unwrap();
        b.write("/movies/b.mp4", b"b", 1000).await.unwrap();
        b.write("/music/c.mp3", b"c", 1000).await.unwrap();
        let entries = b.readdir("/movies");
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn read_only_mode_rejects_mutations() {
        let b = bridge(MountMode::ReadOnly);
        let err = b.write("/a", b"x", 1000).await.unwrap_err();
        assert!(matches!(err, NoiseFsError::ReadOnlyFilesystem));
        assert!(matches!(b.unlink("/a").unwrap_err(), NoiseFsError::ReadOnlyFilesystem));
    }
}
