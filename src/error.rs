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

//! Crate-wide error taxonomy.
//!
//! Each subsystem defines its own `thiserror` enum close to the code that
//! raises it (mirroring the teacher's `StateError` / `KeystoreError` /
//! `P2pError` split); [`NoiseFsError`] is the rollup used at the few seams
//! that need a single type (the client core, the CLI binary).

use std::time::Duration;
use thiserror::Error;

use crate::block::BlockError;
use crate::descriptor::DescriptorError;
use crate::storage::StoreError;

/// Top-level error returned by the client core.
#[derive(Debug, Error)]
pub enum NoiseFsError {
    /// A block or XOR invariant was violated.
    #[error("block: {0}")]
    Block(#[from] BlockError),

    /// The descriptor failed to parse or validate.
    #[error("descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    /// The backend store failed (transient or permanent).
    #[error("storage: {0}")]
    Storage(#[from] StoreError),

    /// The index could not be read or written.
    #[error("index: {0}")]
    Index(#[from] IndexError),

    /// Randomizer selection could not produce a valid pair after exhausting
    /// its retry budget.
    #[error("randomizer pool exhausted for block size {size}")]
    RandomizerExhausted {
        /// Block size the pool failed to serve.
        size: usize,
    },

    /// The cache detected an internal inconsistency (e.g. a resident entry
    /// whose bytes no longer match its own bookkeeping).
    #[error("cache corrupted")]
    CacheCorrupted,

    /// The operation was cancelled by the caller before completion.
    #[error("operation cancelled")]
    OperationCancelled,

    /// A mutating call was made against a read-only mount.
    #[error("read-only filesystem")]
    ReadOnlyFilesystem,

    /// A coalesced block build failed; the message is the flattened cause
    /// (the original error is not `Clone`, so it cannot be shared verbatim
    /// across the callers that coalesced onto the same build).
    #[error("block build failed: {0}")]
    BuildFailed(String),
}

/// Errors raised by the file index (`spec.md` §4.6).
#[derive(Debug, Error)]
pub enum IndexError {
    /// The on-disk index document could not be parsed.
    #[error("index format error")]
    Format,
    /// I/O failure reading or writing the index file.
    #[error("index io error")]
    Io,
}

/// Classifies an error as transient (worth retrying with backoff) or
/// permanent (surfaced immediately). See `spec.md` §7.
pub trait ErrorClass {
    /// True if retrying the same operation later might succeed.
    fn is_transient(&self) -> bool;
}

impl ErrorClass for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::BackendUnavailable | StoreError::Timeout)
    }
}

/// Bounded exponential backoff policy (`spec.md` §4.5.5): initial 100ms,
/// factor 2, cap 5s, at most 5 attempts.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Multiplicative factor applied after each attempt.
    pub factor: u32,
    /// Maximum delay between retries.
    pub cap: Duration,
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            factor: 2,
            cap: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait before the given 1-indexed retry attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.initial;
        for _ in 1..attempt {
            delay = delay.saturating_mul(self.factor).min(self.cap);
        }
        delay.min(self.cap)
    }
}
