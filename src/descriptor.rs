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

//! The per-file manifest binding a file to its OFFSystem triples.
//!
//! The wire encoding is JSON (`spec.md` §6): a self-describing text
//! document with `version`, `filename`, `file_size`, `block_size`,
//! `created_at`, and an ordered `blocks` array of
//! `(data_cid, rand1_cid, rand2_cid)`. Round-tripping bytes through
//! [`Descriptor::to_bytes`] and [`Descriptor::from_bytes`] is exact.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::block_count;

/// The only descriptor format version this crate emits or accepts.
pub const DESCRIPTOR_VERSION: &str = "1";

/// Errors from descriptor construction, parsing, and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// The bytes did not parse as a descriptor document at all.
    #[error("descriptor malformed")]
    Malformed,
    /// The descriptor named a `version` this crate does not support.
    #[error("descriptor version unsupported")]
    VersionUnsupported,
    /// `blocks.len()` did not equal `ceil(file_size / block_size)`.
    #[error("descriptor block count mismatch")]
    BlockCountMismatch,
    /// A triple's randomizer CID equals its data CID, or the two
    /// randomizer CIDs are equal to each other.
    #[error("triple randomizer collides with data or with the other randomizer")]
    DegenerateTriple,
    /// A CID field was empty.
    #[error("empty cid")]
    EmptyCid,
}

/// One OFFSystem triple: the anonymized data block plus the two
/// randomizer blocks that recover it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    /// CID of the anonymized (XORed) data block.
    pub data_cid: String,
    /// CID of the first randomizer block.
    pub rand1_cid: String,
    /// CID of the second randomizer block.
    pub rand2_cid: String,
}

impl Triple {
    fn validate(&self) -> Result<(), DescriptorError> {
        if self.data_cid.is_empty() || self.rand1_cid.is_empty() || self.rand2_cid.is_empty() {
            return Err(DescriptorError::EmptyCid);
        }
        if self.rand1_cid == self.rand2_cid
            || self.rand1_cid == self.data_cid
            || self.rand2_cid == self.data_cid
        {
            return Err(DescriptorError::DegenerateTriple);
        }
        Ok(())
    }
}

/// The file manifest: display metadata plus the ordered triple sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Format version; must equal [`DESCRIPTOR_VERSION`].
    pub version: String,
    /// Display filename. Not authoritative and privacy-sensitive: callers
    /// should not rely on it for anything but display.
    pub filename: String,
    /// Exact byte length of the original file, before padding.
    pub file_size: u64,
    /// Block size shared by every block in this file.
    pub block_size: u64,
    /// Unix timestamp (seconds) the descriptor was created.
    pub created_at: i64,
    /// Ordered triples, one per block.
    pub blocks: Vec<Triple>,
}

impl Descriptor {
    /// Start a new, empty descriptor. `created_at` is supplied by the
    /// caller (a clock collaborator, never read from a hidden global).
    pub fn new(filename: impl Into<String>, file_size: u64, block_size: u64, created_at: i64) -> Self {
        Self {
            version: DESCRIPTOR_VERSION.to_string(),
            filename: filename.into(),
            file_size,
            block_size,
            created_at,
            blocks: Vec::new(),
        }
    }

    /// Append a triple, rejecting it if either randomizer CID collides
    /// with the data CID or with each other.
    pub fn add_triple(
        &mut self,
        data_cid: impl Into<String>,
        rand1_cid: impl Into<String>,
        rand2_cid: impl Into<String>,
    ) -> Result<(), DescriptorError> {
        let triple = Triple {
            data_cid: data_cid.into(),
            rand1_cid: rand1_cid.into(),
            rand2_cid: rand2_cid.into(),
        };
        triple.validate()?;
        self.blocks.push(triple);
        Ok(())
    }

    /// Serialize to the stable JSON wire encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DescriptorError> {
        serde_json::to_vec(self).map_err(|_| DescriptorError::Malformed)
    }

    /// Parse from the stable JSON wire encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DescriptorError> {
        serde_json::from_slice(bytes).map_err(|_| DescriptorError::Malformed)
    }

    /// Check every structural invariant: version, block count vs.
    /// `file_size`/`block_size`, and each triple's CIDs.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.version != DESCRIPTOR_VERSION {
            return Err(DescriptorError::VersionUnsupported);
        }
        let expected = block_count(self.file_size, self.block_size);
        if self.blocks.len() as u64 != expected {
            return Err(DescriptorError::BlockCountMismatch);
        }
        for t in &self.blocks {
            t.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Descriptor {
        let mut d = Descriptor::new("secret.txt", 4096, 131072, 1_700_000_000);
        d.add_triple("data1", "rand1", "rand2").unwrap();
        d
    }

    #[test]
    fn round_trip_is_exact() {
        let d = sample();
        let bytes = d.to_bytes().unwrap();
        let back = Descriptor::from_bytes(&bytes).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn block_count_matches_file_size() {
        let d = sample();
        d.validate().unwrap();
    }

    #[test]
    fn rejects_block_count_mismatch() {
        let mut d = Descriptor::new("f", 300_000, 131072, 0);
        d.add_triple("a", "b", "c").unwrap();
        // needs 3 triples for 300000 bytes at 131072, only 1 present.
        assert_eq!(d.validate().unwrap_err(), DescriptorError::BlockCountMismatch);
    }

    #[test]
    fn rejects_degenerate_triple() {
        let mut d = Descriptor::new("f", 4096, 131072, 0);
        assert_eq!(
            d.add_triple("same", "same", "other").unwrap_err(),
            DescriptorError::DegenerateTriple
        );
        assert_eq!(
            d.add_triple("x", "x", "y").unwrap_err(),
            DescriptorError::DegenerateTriple
        );
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut d = sample();
        d.version = "99".to_string();
        assert_eq!(d.validate().unwrap_err(), DescriptorError::VersionUnsupported);
    }

    #[test]
    fn rejects_malformed_bytes() {
        assert_eq!(
            Descriptor::from_bytes(b"not json").unwrap_err(),
            DescriptorError::Malformed
        );
    }
}
