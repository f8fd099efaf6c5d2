// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Storage Contract
//!
//! The port the engine depends on. Backends (in-memory, SQLite) live in
//! `quarry-storage` and implement [`GraphStore`]; everything above (edge
//! operations, the cache engine, queries, ingestion, the RPC surface) talks
//! only to this trait.
//!
//! Operations are expected to be atomic per key. Cross-key consistency is
//! *not* required: the cache engine serializes itself, and callers that
//! interleave writes with a cache pass accept a re-invocation.

use std::collections::HashMap;

use crate::error::Result;
use crate::node::Node;
use crate::nodeset::NodeSet;

/// Precomputed transitive closure record for one node.
///
/// `all_children` holds every node reachable by following dependency edges
/// out of the node; `all_parents` every node that can reach it. Both exclude
/// the node itself unless it sits on a cycle, in which case every member of
/// the strongly connected component (the node included) appears in both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReachCache {
    pub id: u32,
    pub all_children: NodeSet,
    pub all_parents: NodeSet,
}

/// The storage backend contract.
pub trait GraphStore: Send + Sync {
    /// Persist a node. Assigns a fresh ID when `node.id == 0`, updates the
    /// name index, and marks the node dirty.
    fn save_node(&self, node: &mut Node) -> Result<()>;

    /// Fetch a node by ID, or `NotFound`.
    fn node(&self, id: u32) -> Result<Node>;

    /// Batched fetch. Preserves the order of `ids`; missing IDs are omitted.
    fn nodes(&self, ids: &[u32]) -> Result<Vec<Node>>;

    /// Exact-match name lookup, or `NotFound`.
    fn name_to_id(&self, name: &str) -> Result<u32>;

    /// All nodes whose name matches a glob (`*` any run, `?` one character,
    /// anchored on both ends). Empty patterns are `InvalidArgument`.
    fn nodes_by_glob(&self, pattern: &str) -> Result<Vec<Node>>;

    /// Every extant node ID, ascending.
    fn all_ids(&self) -> Result<Vec<u32>>;

    /// Persist a closure record for `cache.id`.
    fn save_cache(&self, cache: &ReachCache) -> Result<()>;

    /// Fetch the closure record for one node, or `NotFound` if uncached.
    fn cache(&self, id: u32) -> Result<ReachCache>;

    /// Batched cache fetch. Preserves order; missing entries are omitted.
    fn caches(&self, ids: &[u32]) -> Result<Vec<ReachCache>>;

    /// The current dirty set, ascending.
    fn to_be_cached(&self) -> Result<Vec<u32>>;

    /// Mark a node's cache stale.
    fn mark_dirty(&self, id: u32) -> Result<()>;

    /// Mark a node's cache current.
    fn mark_clean(&self, id: u32) -> Result<()>;

    /// Drop every cache record and mark every node dirty.
    fn clear_caches(&self) -> Result<()>;

    /// Stage an opaque blob under `(kind, key, subkey)`, replacing any
    /// previous blob at the same subkey.
    fn put_custom_data(&self, kind: &str, key: &str, subkey: &str, data: &[u8]) -> Result<()>;

    /// All blobs staged under `(kind, key)`, keyed by subkey, or `NotFound`
    /// if nothing was staged.
    fn custom_data(&self, kind: &str, key: &str) -> Result<HashMap<String, Vec<u8>>>;
}
