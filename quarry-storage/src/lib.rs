// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Quarry Storage — Backends for the Graph Store Contract
//!
//! Two implementations of [`quarry_core::GraphStore`]:
//!
//! - [`MemoryStore`] — lock-guarded maps, for tests, tooling, and servers
//!   that rebuild their graph from ingestion on every start
//! - [`SqliteStore`] — single-file persistence; nodes, closure caches, the
//!   dirty set, and staged custom data each get a table, with bitsets stored
//!   in their portable serialized form
//!
//! Both backends enforce the same contract: monotonic ID assignment starting
//! at 1, name uniqueness, dirty-on-save, order-preserving batched reads that
//! omit missing keys, and glob search anchored on both ends. The shared
//! contract test suite in `tests/contract.rs` runs against each.

pub mod glob;
pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
