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

//! NoiseFS - a privacy-preserving content-addressed storage layer.
//!
//! Every block handed to the backend is the XOR of the real data with two
//! independently stored *randomizer* blocks (the OFFSystem 3-tuple
//! construction, `spec.md` §1): no block retrievable from the backend in
//! isolation is a recognizable fragment of any original file.
//!
//! This crate provides:
//! - the block/XOR pipeline and descriptor format (`block`, `descriptor`)
//! - a pluggable content-addressable backend trait plus a sled-backed
//!   reference implementation (`storage`)
//! - the block cache and the client core that orchestrates randomizer
//!   selection, the upload/download state machines, and the concurrency
//!   discipline against the backend (`cache`, `client`)
//! - the persistent filename -> descriptor index (`index`)
//! - the announcement/discovery subsystem for topic- and tag-based content
//!   discovery (`announcement`)
//! - the FUSE bridge contract (`fuse`)

/// Fixed-size blocks, splitting, and the OFFSystem 3-tuple XOR algebra.
pub mod block;
/// The per-file manifest binding a file to its OFFSystem triples.
pub mod descriptor;
/// The storage abstraction isolating the client core from any backend.
pub mod storage;
/// The block cache and randomizer pool substrate.
pub mod cache;
/// The client core: randomizer selection, XOR pipeline, upload/download.
pub mod client;
/// The persistent `path -> descriptor_cid` index.
pub mod index;
/// Topic- and tag-based announcement/discovery subsystem.
pub mod announcement;
/// The FUSE bridge contract (lookup/write/unlink/readdir against the index).
pub mod fuse;
/// Peer identity (Ed25519 keypair persisted to disk).
pub mod identity;
/// Crate-wide error taxonomy.
pub mod error;
/// Canonical binary encoding helpers and shared primitives (`Hash32`).
pub mod codec;
/// Prometheus metrics.
pub mod metrics;
/// Plain, `serde`-deserializable node configuration.
pub mod config;
