// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # In-Memory Backend
//!
//! Lock-guarded maps behind the [`GraphStore`] contract. The graph, the name
//! index, closure caches, the dirty set, and staged custom data each sit
//! under their own `RwLock`, so readers never contend with each other and
//! writers only serialize per structure. That is exactly the contract's
//! per-key atomicity, with no cross-key coordination.
//!
//! ID assignment is a single atomic counter starting at 1; `0` stays
//! reserved as the "unpersisted" marker.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use quarry_core::{GraphError, GraphStore, Node, ReachCache, Result};

use crate::glob;

/// A fully in-memory graph store.
#[derive(Default)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<u32, Node>>,
    names: RwLock<HashMap<String, u32>>,
    caches: RwLock<HashMap<u32, ReachCache>>,
    dirty: RwLock<BTreeSet<u32>>,
    custom: RwLock<HashMap<(String, String), HashMap<String, Vec<u8>>>>,
    next_id: AtomicU32,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryStore {
    fn save_node(&self, node: &mut Node) -> Result<()> {
        if node.id == 0 {
            node.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        }

        {
            let mut names = self.names.write();
            match names.get(&node.name) {
                Some(&existing) if existing != node.id => {
                    return Err(GraphError::AlreadyExists(node.name.clone()));
                }
                _ => {
                    names.insert(node.name.clone(), node.id);
                }
            }
        }

        self.nodes.write().insert(node.id, node.clone());
        self.dirty.write().insert(node.id);
        Ok(())
    }

    fn node(&self, id: u32) -> Result<Node> {
        self.nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(format!("node {id}")))
    }

    fn nodes(&self, ids: &[u32]) -> Result<Vec<Node>> {
        let nodes = self.nodes.read();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    fn name_to_id(&self, name: &str) -> Result<u32> {
        self.names
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::NotFound(format!("node named {name:?}")))
    }

    fn nodes_by_glob(&self, pattern: &str) -> Result<Vec<Node>> {
        let matcher = glob::compile(pattern)?;
        let nodes = self.nodes.read();
        Ok(nodes
            .values()
            .filter(|node| matcher.is_match(&node.name))
            .cloned()
            .collect())
    }

    fn all_ids(&self) -> Result<Vec<u32>> {
        Ok(self.nodes.read().keys().copied().collect())
    }

    fn save_cache(&self, cache: &ReachCache) -> Result<()> {
        self.caches.write().insert(cache.id, cache.clone());
        Ok(())
    }

    fn cache(&self, id: u32) -> Result<ReachCache> {
        self.caches
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(format!("cache for node {id}")))
    }

    fn caches(&self, ids: &[u32]) -> Result<Vec<ReachCache>> {
        let caches = self.caches.read();
        Ok(ids.iter().filter_map(|id| caches.get(id).cloned()).collect())
    }

    fn to_be_cached(&self) -> Result<Vec<u32>> {
        Ok(self.dirty.read().iter().copied().collect())
    }

    fn mark_dirty(&self, id: u32) -> Result<()> {
        self.dirty.write().insert(id);
        Ok(())
    }

    fn mark_clean(&self, id: u32) -> Result<()> {
        self.dirty.write().remove(&id);
        Ok(())
    }

    fn clear_caches(&self) -> Result<()> {
        self.caches.write().clear();
        let ids: Vec<u32> = self.nodes.read().keys().copied().collect();
        let mut dirty = self.dirty.write();
        dirty.extend(ids);
        Ok(())
    }

    fn put_custom_data(&self, kind: &str, key: &str, subkey: &str, data: &[u8]) -> Result<()> {
        self.custom
            .write()
            .entry((kind.to_string(), key.to_string()))
            .or_default()
            .insert(subkey.to_string(), data.to_vec());
        Ok(())
    }

    fn custom_data(&self, kind: &str, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        self.custom
            .read()
            .get(&(kind.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| GraphError::NotFound(format!("custom data {kind}/{key}")))
    }
}
