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

//! The storage abstraction (`spec.md` §4.3): a capability trait isolating
//! the client core from any particular content-addressable backend.
//!
//! This mirrors the teacher's late-bound backend handle re-expressed as a
//! constructor-injected trait object (`spec.md` §9 "interface-based
//! backend polymorphism"); no runtime reflection is used.

pub mod sled_store;

use async_trait::async_trait;
use thiserror::Error;

pub use sled_store::SledStore;

/// Errors a backend may return. `BackendUnavailable` and `Timeout` are
/// transient (retried by the client core); `NotFound` and `IntegrityError`
/// are permanent and surfaced immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or returned a transient failure.
    #[error("backend unavailable")]
    BackendUnavailable,
    /// The operation did not complete before its deadline.
    #[error("timeout")]
    Timeout,
    /// No value exists for the requested CID.
    #[error("not found")]
    NotFound,
    /// The backend returned bytes that do not match the requested CID.
    #[error("integrity error")]
    IntegrityError,
}

/// A content-addressable blob store. `cid` is opaque to implementors of
/// the client core: it is compared for equality only, never parsed.
///
/// Implementations must be idempotent (`put` of identical bytes always
/// yields the same CID) and thread-safe (`Send + Sync`), since the client
/// core treats the backend as a shared external resource accessed from
/// many concurrent tasks.
#[async_trait]
pub trait NoiseStore: Send + Sync {
    /// Store `bytes`, returning its content address. Calling `put` twice
    /// with identical bytes must return the same CID.
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError>;

    /// Fetch the bytes addressed by `cid`.
    async fn get(&self, cid: &str) -> Result<Vec<u8>, StoreError>;

    /// Check whether `cid` is present without fetching its bytes.
    async fn has(&self, cid: &str) -> Result<bool, StoreError>;

    /// Request the backend retain `cid` indefinitely. Backends that have
    /// no concept of pinning may treat this as a no-op.
    async fn pin(&self, _cid: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
