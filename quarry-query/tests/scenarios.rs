// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! End-to-end scenarios over the full stack: node operations, a cache pass,
//! then queries and leaderboards against the closure records.

use quarry_core::cache::cache;
use quarry_core::node::{add_node, set_dependency};
use quarry_core::{CancelToken, GraphError, GraphStore, LIBRARY};
use quarry_query::{custom_leaderboard, query};
use quarry_storage::MemoryStore;

fn names(nodes: &[quarry_core::Node]) -> Vec<&str> {
    nodes.iter().map(|node| node.name.as_str()).collect()
}

#[test]
fn linear_chain() {
    let store = MemoryStore::new();
    let a = add_node(&store, LIBRARY, "A", Vec::new()).unwrap();
    let b = add_node(&store, LIBRARY, "B", Vec::new()).unwrap();
    let c = add_node(&store, LIBRARY, "C", Vec::new()).unwrap();
    set_dependency(&store, a.id, b.id).unwrap();
    set_dependency(&store, b.id, c.id).unwrap();
    cache(&store, &CancelToken::new()).unwrap();

    let down = query(&store, "dependencies library A", &CancelToken::new()).unwrap();
    assert_eq!(names(&down), vec!["B", "C"]);

    let up = query(&store, "dependents library C", &CancelToken::new()).unwrap();
    assert_eq!(names(&up), vec!["A", "B"]);
}

#[test]
fn diamond() {
    let store = MemoryStore::new();
    let a = add_node(&store, LIBRARY, "A", Vec::new()).unwrap();
    let b = add_node(&store, LIBRARY, "B", Vec::new()).unwrap();
    let c = add_node(&store, LIBRARY, "C", Vec::new()).unwrap();
    let d = add_node(&store, LIBRARY, "D", Vec::new()).unwrap();
    set_dependency(&store, a.id, b.id).unwrap();
    set_dependency(&store, a.id, c.id).unwrap();
    set_dependency(&store, b.id, d.id).unwrap();
    set_dependency(&store, c.id, d.id).unwrap();
    cache(&store, &CancelToken::new()).unwrap();

    let a_cache = store.cache(a.id).unwrap();
    assert_eq!(a_cache.all_children.to_vec(), vec![b.id, c.id, d.id]);

    let d_cache = store.cache(d.id).unwrap();
    assert_eq!(d_cache.all_parents.to_vec(), vec![a.id, b.id, c.id]);
}

#[test]
fn cycle() {
    let store = MemoryStore::new();
    let a = add_node(&store, LIBRARY, "A", Vec::new()).unwrap();
    let b = add_node(&store, LIBRARY, "B", Vec::new()).unwrap();
    set_dependency(&store, a.id, b.id).unwrap();
    set_dependency(&store, b.id, a.id).unwrap();
    cache(&store, &CancelToken::new()).unwrap();

    for id in [a.id, b.id] {
        let record = store.cache(id).unwrap();
        assert!(record.all_children.contains(a.id));
        assert!(record.all_children.contains(b.id));
    }
}

#[test]
fn set_algebra_over_a_diamond() {
    let store = MemoryStore::new();
    let a = add_node(&store, LIBRARY, "A", Vec::new()).unwrap();
    let b = add_node(&store, LIBRARY, "B", Vec::new()).unwrap();
    let c = add_node(&store, LIBRARY, "C", Vec::new()).unwrap();
    let d = add_node(&store, LIBRARY, "D", Vec::new()).unwrap();
    set_dependency(&store, a.id, b.id).unwrap();
    set_dependency(&store, a.id, c.id).unwrap();
    set_dependency(&store, b.id, d.id).unwrap();
    set_dependency(&store, c.id, d.id).unwrap();
    cache(&store, &CancelToken::new()).unwrap();

    let out = query(
        &store,
        "(dependencies library A) and (dependents library D)",
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(names(&out), vec!["B", "C"]);
}

#[test]
fn leaderboard_over_a_diamond() {
    let store = MemoryStore::new();
    let a = add_node(&store, LIBRARY, "A", Vec::new()).unwrap();
    let b = add_node(&store, LIBRARY, "B", Vec::new()).unwrap();
    let c = add_node(&store, LIBRARY, "C", Vec::new()).unwrap();
    let d = add_node(&store, LIBRARY, "D", Vec::new()).unwrap();
    set_dependency(&store, a.id, b.id).unwrap();
    set_dependency(&store, a.id, c.id).unwrap();
    set_dependency(&store, b.id, d.id).unwrap();
    set_dependency(&store, c.id, d.id).unwrap();
    cache(&store, &CancelToken::new()).unwrap();

    let rows = custom_leaderboard(&store, "dependencies * focus", 4, &CancelToken::new()).unwrap();
    let summary: Vec<(&str, usize)> = rows
        .iter()
        .map(|row| (row.node.name.as_str(), row.output.len()))
        .collect();
    assert_eq!(summary, vec![("A", 3), ("B", 1), ("C", 1), ("D", 0)]);
}

#[test]
fn stale_graph_gates_queries() {
    let store = MemoryStore::new();
    let a = add_node(&store, LIBRARY, "A", Vec::new()).unwrap();
    let b = add_node(&store, LIBRARY, "B", Vec::new()).unwrap();
    let c = add_node(&store, LIBRARY, "C", Vec::new()).unwrap();
    set_dependency(&store, a.id, b.id).unwrap();
    set_dependency(&store, b.id, c.id).unwrap();
    cache(&store, &CancelToken::new()).unwrap();

    // A new edge without a fresh cache pass makes reachability stale.
    set_dependency(&store, c.id, a.id).unwrap();

    assert_eq!(
        query(&store, "dependencies library A", &CancelToken::new()),
        Err(GraphError::NotCached)
    );

    // A pass clears the gate, and the new cycle is visible.
    cache(&store, &CancelToken::new()).unwrap();
    let down = query(&store, "dependencies library A", &CancelToken::new()).unwrap();
    assert_eq!(names(&down), vec!["A", "B", "C"]);
}
