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

//! Announcement signing and verification (`spec.md` §3, §4.7.3).
//!
//! A `peer_id` is `"<scheme>:<base64url pubkey>"`, where `scheme` is
//! `ed25519` or `secp256k1`; the public key used to verify a signature is
//! derived directly from `peer_id`, never looked up elsewhere. This
//! reuses the teacher's sign-then-verify shape (`core::security::keystore`
//! generates an Ed25519 keypair via `ring`, persists it, and signs
//! canonical bytes) generalized to the two schemes the spec allows, with
//! `k256` supplying Secp256k1 (grounded in the corpus's other chain
//! repositories, which use `k256`/`secp256k1` for exactly this).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use k256::ecdsa::{Signature as Secp256k1Signature, SigningKey, VerifyingKey};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use thiserror::Error;

use super::types::Announcement;
use crate::codec::Hash32;

/// Errors signing or verifying an announcement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    /// `peer_id` was not `"<scheme>:<base64url pubkey>"` for a known
    /// scheme, or the public key bytes were the wrong length.
    #[error("peer id unparseable")]
    PeerIdUnparseable,
    /// Key generation or signing failed at the crypto layer.
    #[error("signing failed")]
    SigningFailed,
    /// The signature did not verify against the derived public key.
    #[error("signature invalid")]
    SignatureInvalid,
}

/// The two signature schemes `spec.md` §3 allows for announcement
/// signing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyScheme {
    /// Ed25519 (the teacher's keystore scheme).
    Ed25519,
    /// Secp256k1 ECDSA.
    Secp256k1,
}

impl KeyScheme {
    fn as_str(self) -> &'static str {
        match self {
            KeyScheme::Ed25519 => "ed25519",
            KeyScheme::Secp256k1 => "secp256k1",
        }
    }
}

/// A loaded signing key plus the `peer_id` string that announcements
/// carry so a verifier can recover the matching public key.
pub enum AnnouncementSigner {
    /// Ed25519 keypair.
    Ed25519(Ed25519KeyPair),
    /// Secp256k1 signing key.
    Secp256k1(SigningKey),
}

impl AnnouncementSigner {
    /// Generate a fresh Ed25519 signer.
    pub fn generate_ed25519() -> Result<Self, SigningError> {
        let rng = SystemRandom::new();
        let pkcs8 =
            Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| SigningError::SigningFailed)?;
        let kp = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|_| SigningError::SigningFailed)?;
        Ok(Self::Ed25519(kp))
    }

    /// Generate a fresh Secp256k1 signer.
    pub fn generate_secp256k1() -> Self {
        let mut bytes = [0u8; 32];
        let rng = SystemRandom::new();
        loop {
            if ring::rand::SecureRandom::fill(&rng, &mut bytes).is_ok() {
                if let Ok(key) = SigningKey::from_bytes((&bytes).into()) {
                    return Self::Secp256k1(key);
                }
            }
        }
    }

    fn scheme(&self) -> KeyScheme {
        match self {
            AnnouncementSigner::Ed25519(_) => KeyScheme::Ed25519,
            AnnouncementSigner::Secp256k1(_) => KeyScheme::Secp256k1,
        }
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        match self {
            AnnouncementSigner::Ed25519(kp) => kp.public_key().as_ref().to_vec(),
            AnnouncementSigner::Secp256k1(sk) => {
                VerifyingKey::from(sk).to_encoded_point(true).as_bytes().to_vec()
            }
        }
    }

    /// The `peer_id` string this signer's announcements should carry.
    pub fn peer_id(&self) -> String {
        encode_peer_id(self.scheme(), &self.public_key_bytes())
    }

    /// Sign `msg`, returning a base64url-encoded signature suitable for
    /// an announcement's `signature` field.
    pub fn sign(&self, msg: &[u8]) -> String {
        let sig_bytes: Vec<u8> = match self {
            AnnouncementSigner::Ed25519(kp) => kp.sign(msg).as_ref().to_vec(),
            AnnouncementSigner::Secp256k1(sk) => {
                let digest = Hash32::digest(msg);
                let sig: Secp256k1Signature = sk.sign(digest.as_bytes());
                sig.to_bytes().to_vec()
            }
        };
        URL_SAFE_NO_PAD.encode(sig_bytes)
    }

    /// Sign an announcement's canonical bytes and fill in its `peer_id`
    /// and `signature` fields.
    pub fn sign_announcement(&self, announcement: &mut Announcement) {
        announcement.peer_id = Some(self.peer_id());
        let canonical = announcement.canonical_signing_bytes();
        announcement.signature = Some(self.sign(&canonical));
    }
}

fn encode_peer_id(scheme: KeyScheme, pubkey: &[u8]) -> String {
    format!("{}:{}", scheme.as_str(), URL_SAFE_NO_PAD.encode(pubkey))
}

fn decode_peer_id(peer_id: &str) -> Result<(KeyScheme, Vec<u8>), SigningError> {
    let (scheme, encoded) = peer_id.split_once(':').ok_or(SigningError::PeerIdUnparseable)?;
    let scheme = match scheme {
        "ed25519" => KeyScheme::Ed25519,
        "secp256k1" => KeyScheme::Secp256k1,
        _ => return Err(SigningError::PeerIdUnparseable),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SigningError::PeerIdUnparseable)?;
    match scheme {
        KeyScheme::Ed25519 if bytes.len() != 32 => return Err(SigningError::PeerIdUnparseable),
        KeyScheme::Secp256k1 if bytes.len() != 33 && bytes.len() != 65 => {
            return Err(SigningError::PeerIdUnparseable)
        }
        _ => {}
    }
    Ok((scheme, bytes))
}

/// Verify that `peer_id` parses to a recognized scheme + public key,
/// without checking any signature. Used by the validator to reject an
/// unparseable `peer_id` even when no signature is present.
pub fn validate_peer_id(peer_id: &str) -> Result<(), SigningError> {
    decode_peer_id(peer_id).map(|_| ())
}

/// Verify `signature` (base64url) over `msg`, deriving the public key
/// from `peer_id`.
pub fn verify(peer_id: &str, msg: &[u8], signature: &str) -> Result<(), SigningError> {
    let (scheme, pubkey) = decode_peer_id(peer_id)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| SigningError::SignatureInvalid)?;

    match scheme {
        KeyScheme::Ed25519 => {
            let key = UnparsedPublicKey::new(&ED25519, &pubkey);
            key.verify(msg, &sig_bytes)
                .map_err(|_| SigningError::SignatureInvalid)
        }
        KeyScheme::Secp256k1 => {
            let verifying = VerifyingKey::from_sec1_bytes(&pubkey)
                .map_err(|_| SigningError::PeerIdUnparseable)?;
            let sig = Secp256k1Signature::from_slice(&sig_bytes)
                .map_err(|_| SigningError::SignatureInvalid)?;
            let digest = Hash32::digest(msg);
            verifying
                .verify(digest.as_bytes(), &sig)
                .map_err(|_| SigningError::SignatureInvalid)
        }
    }
}

/// Verify an announcement's signature against its own `peer_id`, over its
/// canonical signing bytes (`spec.md` §4.7.3).
pub fn verify_announcement(announcement: &Announcement) -> Result<(), SigningError> {
    let peer_id = announcement
        .peer_id
        .as_deref()
        .ok_or(SigningError::PeerIdUnparseable)?;
    let signature = announcement
        .signature
        .as_deref()
        .ok_or(SigningError::SignatureInvalid)?;
    verify(peer_id, &announcement.canonical_signing_bytes(), signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcement::types::{Category, SizeClass, ANNOUNCEMENT_VERSION};

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
    fn ed25519_sign_and_verify_round_trips() {
        let signer = AnnouncementSigner::generate_ed25519().unwrap();
        let mut ann = sample();
        signer.sign_announcement(&mut ann);
        verify_announcement(&ann).unwrap();
    }

    #[test]
    fn secp256k1_sign_and_verify_round_trips() {
        let signer = AnnouncementSigner::generate_secp256k1();
        let mut ann = sample();
        signer.sign_announcement(&mut ann);
        verify_announcement(&ann).unwrap();
    }

    #[test]
    fn tampering_invalidates_signature() {
        let signer = AnnouncementSigner::generate_ed25519().unwrap();
        let mut ann = sample();
        signer.sign_announcement(&mut ann);
        ann.descriptor_cid = "bafyTAMPERED".to_string();
        assert_eq!(
            verify_announcement(&ann).unwrap_err(),
            SigningError::SignatureInvalid
        );
    }

    #[test]
    fn rejects_garbage_peer_id() {
        assert_eq!(
            validate_peer_id("not-a-real-scheme:xx").unwrap_err(),
            SigningError::PeerIdUnparseable
        );
    }
}
