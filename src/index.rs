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

//! The local file index (`spec.md` §4.6): a persistent `path ->
//! descriptor_cid` mapping backing the [`crate::fuse`] bridge, saved as
//! canonical bincode via an atomic write-then-rename, matching the
//! identity file's own write pattern (`src/identity.rs`).

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::codec::{decode_canonical_limited, encode_canonical};
use crate::error::IndexError;

const MAX_INDEX_BYTES: usize = 64 * 1024 * 1024;

/// One entry in the index: the descriptor CID plus enough metadata to
/// answer `readdir`/`lookup` without fetching the descriptor itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// CID of the file's descriptor.
    pub descriptor_cid: String,
    /// Original file size in bytes.
    pub file_size: u64,
    /// Unix seconds the entry was added or last updated.
    pub modified_at: i64,
}

#[derive(Default, Serialize, Deserialize)]
struct Document {
    entries: HashMap<String, IndexEntry>,
}

/// A persistent, path-keyed mapping from filesystem path to descriptor
/// CID, with a dirty flag tracking unsaved mutations.
pub struct FileIndex {
    path: PathBuf,
    inner: RwLock<Inner>,
}

struct Inner {
    document: Document,
    dirty: bool,
}

impl FileIndex {
    /// Load the index from `path` if it exists, or start empty. The
    /// path is only actually created on the next [`FileIndex::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let bytes = fs::read(&path).map_err(|_| IndexError::Io)?;
            decode_canonical_limited(&bytes, MAX_INDEX_BYTES).map_err(|_| IndexError::Format)?
        } else {
            Document::default()
        };
        Ok(Self {
            path,
            inner: RwLock::new(Inner { document, dirty: false }),
        })
    }

    /// Insert or replace the entry for `path`, marking the index dirty.
    pub fn add(&self, path: &str, entry: IndexEntry) {
        let mut inner = self.inner.write().expect("file index poisoned");
        inner.document.entries.insert(path.to_string(), entry);
        inner.dirty = true;
    }

    /// Remove the entry for `path`, if present, returning it.
    pub fn remove(&self, path: &str) -> Option<IndexEntry> {
        let mut inner = self.inner.write().expect("file index poisoned");
        let removed = inner.document.entries.remove(path);
        if removed.is_some() {
            inner.dirty = true;
        }
        removed
    }

    /// Look up the entry for `path`.
    pub fn lookup(&self, path: &str) -> Option<IndexEntry> {
        self.inner
            .read()
            .expect("file index poisoned")
            .document
            .entries
            .get(path)
            .cloned()
    }

    /// Snapshot every indexed path and its entry. The returned map is a
    /// copy; it never shares internal state with the index, so callers
    /// may hold it across further mutating calls.
    pub fn list(&self) -> HashMap<String, IndexEntry> {
        self.inner.read().expect("file index poisoned").document.entries.clone()
    }

    /// True if there are unsaved mutations since the last successful
    /// [`FileIndex::save`].
    pub fn is_dirty(&self) -> bool {
        self.inner.read().expect("file index poisoned").dirty
    }

    /// Persist the index to its backing path via a temp-file-then-rename,
    /// clearing the dirty flag on success (`spec.md` §4.6 durability).
    pub fn save(&self) -> Result<(), IndexError> {
        let mut inner = self.inner.write().expect("file index poisoned");
        let bytes = encode_canonical(&inner.document).map_err(|_| IndexError::Format)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|_| IndexError::Io)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp).map_err(|_| IndexError::Io)?;
            f.write_all(&bytes).map_err(|_| IndexError::Io)?;
            f.sync_all().map_err(|_| IndexError::Io)?;
        }
        fs::rename(&tmp, &self.path).map_err(|_| IndexError::Io)?;

        inner.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(cid: &str) -> IndexEntry {
        IndexEntry {
            descriptor_cid: cid.to_string(),
            file_size: 1024,
            modified_at: 1_700_000_000,
        }
    }

    #[test]
    fn add_lookup_remove_round_trip() {
        let dir = tempdir().unwrap();
        let index = FileIndex::load(dir.path().join("index.bin")).unwrap();
        assert!(!index.is_dirty());

        index.add("/movies/a.mp4", entry("bafy1"));
        assert!(index.is_dirty());
        assert_eq!(index.lookup("/movies/a.mp4").unwrap().descriptor_cid, "bafy1");

        let removed = index.remove("/movies/a.mp4");
        assert_eq!(removed.unwrap().descriptor_cid, "bafy1");
        assert!(index.lookup("/movies/a.mp4").is_none());
    }

    #[test]
    fn save_clears_dirty_and_load_recovers_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let index = FileIndex::load(&path).unwrap();
        index.add("/a", entry("bafy1"));
        index.add("/b", entry("bafy2"));
        index.save().unwrap();
        assert!(!index.is_dirty());

        let reloaded = FileIndex::load(&path).unwrap();
        let listed = reloaded.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.get("/a").unwrap().descriptor_cid, "bafy1");
        assert_eq!(listed.get("/b").unwrap().descriptor_cid, "bafy2");
    }

    #[test]
    fn list_is_a_copy_with_every_entry() {
        let dir = tempdir().unwrap();
        let index = FileIndex::load(dir.path().join("index.bin")).unwrap();
        index.add("/z", entry("bafyZ"));
        index.add("/a", entry("bafyA"));

        let listed = index.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.get("/a").unwrap().descriptor_cid, "bafyA");
        assert_eq!(listed.get("/z").unwrap().descriptor_cid, "bafyZ");

        index.add("/new", entry("bafyNew"));
        assert_eq!(listed.len(), 2, "snapshot must not observe later mutations");
    }
}
