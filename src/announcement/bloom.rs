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

//! A bloom filter over an announcement's tags (`spec.md` §4.7.2), so a
//! peer can test candidate tags without the announcer ever revealing the
//! tag set itself. Never yields a false negative; false positives are a
//! deliberate privacy feature.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

/// Errors decoding a bloom filter from its wire form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BloomError {
    /// The base64url payload did not decode.
    #[error("bloom filter base64 decode failed")]
    Base64,
    /// The decoded payload was shorter than its own header claims.
    #[error("bloom filter truncated")]
    Truncated,
}

/// A normalized tag: lowercase, trimmed, internal whitespace collapsed to
/// a single space (`spec.md` §4.7.2).
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fnv1a(bytes: &[u8], salt: u32) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET ^ salt;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A space-efficient probabilistic set of tags, backed by `m` bits and
/// `k` hash functions derived by double hashing two FNV-1a digests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BloomFilter {
    m: u32,
    k: u8,
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Minimum bit-array size, regardless of `n`/`p` (`spec.md` §4.7.2).
    const MIN_BITS: u32 = 64;

    /// Build an empty filter sized for `expected_items` at
    /// `false_positive_rate`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = (expected_items.max(1)) as f64;
        let p = false_positive_rate.clamp(1e-6, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let m = ((-n * p.ln()) / (ln2 * ln2)).ceil() as u32;
        let m = m.max(Self::MIN_BITS);
        let k = (((m as f64) / n) * ln2).ceil() as u32;
        let k = k.clamp(1, 255) as u8;
        let bytes = (m as usize).div_ceil(8);
        Self {
            m,
            k,
            bits: vec![0u8; bytes],
        }
    }

    /// Build a filter from an explicit tag set, sized for `|tags|` at
    /// `false_positive_rate`.
    pub fn from_tags(tags: &[String], false_positive_rate: f64) -> Self {
        let mut filter = Self::new(tags.len(), false_positive_rate);
        for tag in tags {
            filter.insert(tag);
        }
        filter
    }

    fn indices(&self, tag: &str) -> Vec<usize> {
        let normalized = normalize_tag(tag);
        let h1 = fnv1a(normalized.as_bytes(), 0);
        let h2 = fnv1a(normalized.as_bytes(), 0x9e37_79b9);
        (0..self.k as u32)
            .map(|i| {
                let combined = h1.wrapping_add(i.wrapping_mul(h2));
                (combined % self.m) as usize
            })
            .collect()
    }

    /// Insert a (normalized) tag into the filter.
    pub fn insert(&mut self, tag: &str) {
        for idx in self.indices(tag) {
            self.bits[idx / 8] |= 1 << (idx % 8);
        }
    }

    /// Test whether `tag` may be in the filter. Never false-negative for
    /// a tag that was actually inserted.
    pub fn test(&self, tag: &str) -> bool {
        self.indices(tag).into_iter().all(|idx| self.bits[idx / 8] & (1 << (idx % 8)) != 0)
    }

    /// Number of bits in the filter.
    pub fn bit_len(&self) -> u32 {
        self.m
    }

    /// Number of hash functions.
    pub fn hash_count(&self) -> u8 {
        self.k
    }

    /// Encode as the wire format: big-endian 4-byte `m`, 1-byte `k`,
    /// `ceil(m/8)` payload bytes, base64url (no padding).
    pub fn to_base64url(&self) -> String {
        let mut buf = Vec::with_capacity(5 + self.bits.len());
        buf.extend_from_slice(&self.m.to_be_bytes());
        buf.push(self.k);
        buf.extend_from_slice(&self.bits);
        URL_SAFE_NO_PAD.encode(buf)
    }

    /// Decode from the wire format.
    pub fn from_base64url(s: &str) -> Result<Self, BloomError> {
        let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| BloomError::Base64)?;
        if bytes.len() < 5 {
            return Err(BloomError::Truncated);
        }
        let m = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let k = bytes[4];
        let expected_len = 5 + (m as usize).div_ceil(8);
        if bytes.len() < expected_len {
            return Err(BloomError::Truncated);
        }
        Ok(Self {
            m,
            k,
            bits: bytes[5..expected_len].to_vec(),
        })
    }
}

/// Test whether `bloom` (given as its wire-encoded base64url form) is
/// consistent with every tag in `tags`, i.e. `matches_tags`-style helper
/// used by the search engine (`spec.md` §4.7.7): true only if every tag
/// tests positive.
pub fn matches_all(bloom: &BloomFilter, tags: &[&str]) -> bool {
    tags.iter().all(|t| bloom.test(t))
}

/// True if at least one of `tags` tests positive against `bloom`.
pub fn matches_any(bloom: &BloomFilter, tags: &[&str]) -> bool {
    tags.iter().any(|t| bloom.test(t))
}
