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

//! Fixed-size blocks, splitting, and the OFFSystem 3-tuple XOR algebra.

mod xor;

pub use xor::xor3;

use thiserror::Error;

/// Largest block size this crate will split or XOR.
///
/// Not named in `spec.md`; chosen generously above the 128 KiB default to
/// avoid rejecting legitimate configurations while still bounding memory
/// use per block.
pub const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

/// Default block size (128 KiB), used when a caller doesn't specify one.
pub const DEFAULT_BLOCK_SIZE: usize = 128 * 1024;

/// Errors from splitting, XOR, and reconstruction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    /// The requested block size is zero or exceeds [`MAX_BLOCK_SIZE`].
    #[error("invalid block size")]
    InvalidBlockSize,
    /// Blocks passed to `xor3` are not all the same length.
    #[error("mismatched block size")]
    MismatchedBlockSize,
}

/// An immutable, fixed-size byte block.
///
/// Identity is the backend's content address once stored; the block
/// itself is opaque bytes with no embedded length prefix or checksum (the
/// backend is responsible for content addressing).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block(Vec<u8>);

impl Block {
    /// Wrap raw bytes as a block, taking ownership.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the block's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the block, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Block length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the block is empty (zero-length blocks are legal only as
    /// an intermediate value; splitting never produces one).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split `stream` into fixed-size blocks of `block_size` bytes. The final
/// block is zero-padded up to `block_size` (`spec.md` §9 resolves the
/// padding-scheme ambiguity in favor of zero-fill); the caller recovers the
/// true length via the descriptor's `file_size` at reconstruction time.
///
/// An empty stream still produces exactly one (fully padded) block, so
/// that `ceil(file_size / block_size) == blocks.len()` holds for
/// `file_size == 0` as well as for every positive size.
pub fn split(stream: &[u8], block_size: usize) -> Result<Vec<Block>, BlockError> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(BlockError::InvalidBlockSize);
    }

    let mut blocks = Vec::with_capacity(stream.len() / block_size + 1);
    let mut offset = 0;
    loop {
        let end = (offset + block_size).min(stream.len());
        let mut chunk = stream[offset..end].to_vec();
        let is_last_chunk = end == stream.len();
        if is_last_chunk {
            chunk.resize(block_size, 0u8);
            blocks.push(Block::new(chunk));
            break;
        }
        blocks.push(Block::new(chunk));
        offset = end;
    }
    Ok(blocks)
}

/// Number of blocks `split` would produce for a stream of `file_size` bytes
/// at `block_size`, i.e. `ceil(file_size / block_size)`, with the same
/// convention that a zero-length file still yields one block.
pub fn block_count(file_size: u64, block_size: u64) -> u64 {
    if block_size == 0 {
        return 0;
    }
    file_size.div_ceil(block_size).max(1)
}

/// Reconstruct the original stream from a sequence of already-XORed
/// blocks (each the result of `xor3(data, r1, r2)`), truncating the
/// concatenation to `file_size` bytes.
pub fn reconstruct(blocks: &[Block], file_size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(file_size as usize);
    for b in blocks {
        out.extend_from_slice(b.as_bytes());
    }
    out.truncate(file_size as usize);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_pads_final_block() {
        let data = vec![0x42u8; 4096];
        let blocks = split(&data, 131072).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 131072);
        assert_eq!(&blocks[0].as_bytes()[..4096], &data[..]);
        assert!(blocks[0].as_bytes()[4096..].iter().all(|&b| b == 0));
    }

    #[test]
    fn split_three_blocks() {
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 256) as u8).collect();
        let blocks = split(&data, 131072).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(block_count(300_000, 131072), 3);
        let rebuilt = reconstruct(&blocks, 300_000);
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn split_rejects_bad_size() {
        assert_eq!(split(b"x", 0).unwrap_err(), BlockError::InvalidBlockSize);
        assert_eq!(
            split(b"x", MAX_BLOCK_SIZE + 1).unwrap_err(),
            BlockError::InvalidBlockSize
        );
    }

    #[test]
    fn empty_stream_yields_one_block() {
        let blocks = split(&[], 1024).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(block_count(0, 1024), 1);
    }
}
