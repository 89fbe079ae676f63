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

//! The announcement record and its compact wire envelope (`spec.md` §3,
//! §6). Field names on the wire are short (`v`, `d`, `t`, ...) because the
//! format is interop-critical and the spec requires the compact keys
//! verbatim; the in-memory struct keeps the readable names and maps them
//! via `serde(rename)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only announcement format version this crate emits or accepts.
pub const ANNOUNCEMENT_VERSION: &str = "1";

/// Largest serialized announcement this crate will accept (`spec.md` §6).
pub const MAX_ANNOUNCEMENT_BYTES: usize = 10 * 1024;
/// Smallest serialized announcement this crate will accept (`spec.md` §6).
pub const MIN_ANNOUNCEMENT_BYTES: usize = 50;

/// Content category, the richer 8-member enumeration `spec.md` §9 adopts
/// to resolve the two-validator ambiguity in the source material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Video content.
    Video,
    /// Audio content.
    Audio,
    /// Text or office documents.
    Document,
    /// Structured data (datasets, databases, etc).
    Data,
    /// Software packages or binaries.
    Software,
    /// Still images.
    Image,
    /// Compressed archives or container formats.
    Archive,
    /// Anything not covered by the above.
    Other,
}

impl Category {
    /// All recognized categories, for validation and test enumeration.
    pub const ALL: [Category; 8] = [
        Category::Video,
        Category::Audio,
        Category::Document,
        Category::Data,
        Category::Software,
        Category::Image,
        Category::Archive,
        Category::Other,
    ];
}

/// Approximate file size bucket, coarse enough to not leak the exact
/// size while still being useful for search filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// < 1 MiB.
    Tiny,
    /// < 10 MiB.
    Small,
    /// < 100 MiB.
    Medium,
    /// < 1 GiB.
    Large,
    /// >= 1 GiB.
    Huge,
}

impl SizeClass {
    /// Classify a byte length into its bucket (`spec.md` §3).
    pub fn classify(bytes: u64) -> Self {
        const MIB: u64 = 1024 * 1024;
        const GIB: u64 = 1024 * MIB;
        if bytes < MIB {
            SizeClass::Tiny
        } else if bytes < 10 * MIB {
            SizeClass::Small
        } else if bytes < 100 * MIB {
            SizeClass::Medium
        } else if bytes < GIB {
            SizeClass::Large
        } else {
            SizeClass::Huge
        }
    }
}

/// Errors constructing or (de)serializing an announcement. Semantic
/// validation (timestamps, ttl ranges, signatures, ...) lives in
/// [`super::validation`]; these are purely structural/encoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnouncementCodecError {
    /// The bytes did not parse as an announcement document.
    #[error("announcement malformed")]
    Malformed,
    /// The serialized form fell outside `[MIN_ANNOUNCEMENT_BYTES,
    /// MAX_ANNOUNCEMENT_BYTES]`.
    #[error("announcement size out of range")]
    SizeOutOfRange,
}

/// A short, discoverable record binding a descriptor CID to a topic and
/// (optionally) a set of tags, signed by its announcer (`spec.md` §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Format version; must equal [`ANNOUNCEMENT_VERSION`].
    #[serde(rename = "v")]
    pub version: String,
    /// CID of the descriptor being announced.
    #[serde(rename = "d")]
    pub descriptor_cid: String,
    /// 64-hex SHA-256 of the normalized topic path.
    #[serde(rename = "t")]
    pub topic_hash: String,
    /// Base64url-encoded bloom filter over the content's tags.
    #[serde(rename = "tb", skip_serializing_if = "Option::is_none")]
    pub tag_bloom: Option<String>,
    /// Coarse content category.
    #[serde(rename = "c")]
    pub category: Category,
    /// Coarse size bucket.
    #[serde(rename = "s")]
    pub size_class: SizeClass,
    /// Unix seconds the announcement was created.
    #[serde(rename = "ts")]
    pub timestamp: i64,
    /// Seconds after `timestamp` the announcement is valid for.
    #[serde(rename = "ttl")]
    pub ttl: u64,
    /// Random 8-32 char nonce, used for idempotent store insertion.
    #[serde(rename = "n", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// `"<scheme>:<base64url pubkey>"`, e.g. `"ed25519:..."`.
    #[serde(rename = "pid", skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
    /// Base64url signature over the canonicalized announcement
    /// (`spec.md` §4.7.3), excluding this field.
    #[serde(rename = "sig", skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Announcement {
    /// Unix-second instant this announcement expires at.
    pub fn expires_at(&self) -> i64 {
        self.timestamp.saturating_add(self.ttl as i64)
    }

    /// True if `now` is at or past [`expires_at`](Self::expires_at).
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    /// Serialize to the compact JSON wire encoding, rejecting sizes
    /// outside `[MIN_ANNOUNCEMENT_BYTES, MAX_ANNOUNCEMENT_BYTES]`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AnnouncementCodecError> {
        let bytes =
            serde_json::to_vec(self).map_err(|_| AnnouncementCodecError::Malformed)?;
        if bytes.len() < MIN_ANNOUNCEMENT_BYTES || bytes.len() > MAX_ANNOUNCEMENT_BYTES {
            return Err(AnnouncementCodecError::SizeOutOfRange);
        }
        Ok(bytes)
    }

    /// Parse from the compact JSON wire encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AnnouncementCodecError> {
        if bytes.len() < MIN_ANNOUNCEMENT_BYTES || bytes.len() > MAX_ANNOUNCEMENT_BYTES {
            return Err(AnnouncementCodecError::SizeOutOfRange);
        }
        serde_json::from_slice(bytes).map_err(|_| AnnouncementCodecError::Malformed)
    }

    /// Canonical byte representation used for signing (`spec.md` §4.7.3):
    /// a stable field order, excluding `signature` itself. JSON key order
    /// is not a reliable cross-encoder contract, so this is a deliberate
    /// fixed-order buffer rather than `serde_json` output.
    pub fn canonical_signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut push = |s: &str| {
            buf.extend_from_slice(s.as_bytes());
            buf.push(0);
        };
        push(&self.version);
        push(&self.descriptor_cid);
        push(&self.topic_hash);
        push(self.tag_bloom.as_deref().unwrap_or(""));
        push(match self.category {
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Document => "document",
            Category::Data => "data",
            Category::Software => "software",
            Category::Image => "image",
            Category::Archive => "archive",
            Category::Other => "other",
        });
        push(match self.size_class {
            SizeClass::Tiny => "tiny",
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
            SizeClass::Huge => "huge",
        });
        push(&self.timestamp.to_string());
        push(&self.ttl.to_string());
        push(self.nonce.as_deref().unwrap_or(""));
        push(self.peer_id.as_deref().unwrap_or(""));
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Announcement {
        Announcement {
            version: ANNOUNCEMENT_VERSION.to_string(),
            descriptor_cid: "bafy1234567890".to_string(),
            topic_hash: "a".repeat(64),
            tag_bloom: None,
            category: Category::Video,
            size_class: SizeClass::Medium,
            timestamp: 1_700_000_000,
            ttl: 3600,
            nonce: Some("abcd1234".to_string()),
            peer_id: None,
            signature: None,
        }
    }

    #[test]
    fn size_class_classifies_boundaries() {
        assert_eq!(SizeClass::classify(0), SizeClass::Tiny);
        assert_eq!(SizeClass::classify(2 * 1024 * 1024), SizeClass::Small);
        assert_eq!(SizeClass::classify(50 * 1024 * 1024), SizeClass::Medium);
        assert_eq!(SizeClass::classify(500 * 1024 * 1024), SizeClass::Large);
        assert_eq!(SizeClass::classify(2 * 1024 * 1024 * 1024), SizeClass::Huge);
    }

    #[test]
    fn expiry_math() {
        let a = sample();
        assert_eq!(a.expires_at(), 1_700_003_600);
        assert!(!a.is_expired(1_700_003_599));
        assert!(a.is_expired(1_700_003_600));
    }

    #[test]
    fn compact_field_names_round_trip() {
        let a = sample();
        let bytes = a.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"v\":"));
        assert!(text.contains("\"d\":"));
        assert!(text.contains("\"t\":"));
        assert!(text.contains("\"ts\":"));
        let back = Announcement::from_bytes(&bytes).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn canonical_bytes_exclude_signature_and_are_stable() {
        let mut a = sample();
        let c1 = a.canonical_signing_bytes();
        a.signature = Some("whatever".to_string());
        let c2 = a.canonical_signing_bytes();
        assert_eq!(c1, c2);
    }

    #[test]
    fn rejects_undersized_payload() {
        let err = Announcement::from_bytes(b"{}").unwrap_err();
        assert_eq!(err, AnnouncementCodecError::SizeOutOfRange);
    }
}
