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

//! Canonical binary encoding helpers and small shared primitives.
//!
//! The descriptor and announcement *wire* formats are JSON (`spec.md` §6);
//! this module's bincode helpers back the internal, non-interop encodings
//! (the persisted file index, the sled reference backend) where a compact
//! deterministic byte representation is preferable to JSON.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Canonical (de)serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("serialization")]
    Serialize,
    /// Deserialization failed.
    #[error("deserialization")]
    Deserialize,
    /// The payload exceeded the configured size limit.
    #[error("size limit exceeded")]
    TooLarge,
}

fn bincode_opts() -> impl bincode::Options {
    use bincode::Options;
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode a value with fixed-width integers and no trailing-byte tolerance,
/// so the same value always serializes to the same bytes.
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    use bincode::Options;
    bincode_opts().serialize(v).map_err(|_| CodecError::Serialize)
}

/// Decode a value, rejecting payloads over `max` bytes before and during
/// deserialization (defends against memory/CPU bombs from oversized
/// container lengths encoded in the payload itself).
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    use bincode::Options;
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// A 256-bit hash (SHA-256 digest), used for topic hashes and content
/// fingerprints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash32([u8; 32]);

impl Hash32 {
    /// Wrap raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// SHA-256 digest of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let d = ring::digest::digest(&ring::digest::SHA256, data);
        let mut out = [0u8; 32];
        out.copy_from_slice(d.as_ref());
        Self(out)
    }

    /// Lowercase hex encoding (64 chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string; requires exactly 64 hex characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 {
            return None;
        }
        let bytes = hex::decode(s).ok()?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Some(Self(out))
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn round_trips() {
        let s = Sample { a: 7, b: "hi".into() };
        let bytes = encode_canonical(&s).unwrap();
        let back: Sample = decode_canonical_limited(&bytes, 1024).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn rejects_oversized_payload() {
        let s = Sample { a: 7, b: "hello world".into() };
        let bytes = encode_canonical(&s).unwrap();
        let err = decode_canonical_limited::<Sample>(&bytes, 4).unwrap_err();
        assert!(matches!(err, CodecError::TooLarge));
    }

    #[test]
    fn hash_hex_round_trips() {
        let h = Hash32::digest(b"noisefs");
        let hex = h.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Hash32::from_hex(&hex), Some(h));
    }
}
