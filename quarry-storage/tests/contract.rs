// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! Contract tests run identically against every backend: whatever store the
//! engine is handed, node operations must behave the same way.

use quarry_core::node::{add_node, set_dependency};
use quarry_core::{GraphError, GraphStore, LIBRARY};
use quarry_storage::{MemoryStore, SqliteStore};

fn backends() -> Vec<(&'static str, Box<dyn GraphStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        (
            "sqlite",
            Box::new(SqliteStore::open_in_memory().expect("open in-memory sqlite")),
        ),
    ]
}

#[test]
fn add_node_then_lookup_by_name_returns_same_node() {
    for (backend, store) in backends() {
        let node = add_node(store.as_ref(), LIBRARY, "pkg:cargo/serde@1.0.0", b"m".to_vec())
            .unwrap_or_else(|err| panic!("{backend}: {err}"));

        let id = store.name_to_id("pkg:cargo/serde@1.0.0").unwrap();
        assert_eq!(id, node.id, "{backend}");
        assert_eq!(store.node(id).unwrap(), node, "{backend}");
    }
}

#[test]
fn add_node_rejects_duplicates_and_empty_names() {
    for (backend, store) in backends() {
        add_node(store.as_ref(), LIBRARY, "a", Vec::new()).unwrap();

        assert!(
            matches!(
                add_node(store.as_ref(), LIBRARY, "a", Vec::new()),
                Err(GraphError::AlreadyExists(_))
            ),
            "{backend}"
        );
        assert!(
            matches!(
                add_node(store.as_ref(), LIBRARY, "", Vec::new()),
                Err(GraphError::InvalidArgument(_))
            ),
            "{backend}"
        );
    }
}

#[test]
fn set_dependency_mirrors_both_endpoints_and_marks_dirty() {
    for (backend, store) in backends() {
        let a = add_node(store.as_ref(), LIBRARY, "a", Vec::new()).unwrap();
        let b = add_node(store.as_ref(), LIBRARY, "b", Vec::new()).unwrap();

        set_dependency(store.as_ref(), a.id, b.id).unwrap();

        let a = store.node(a.id).unwrap();
        let b = store.node(b.id).unwrap();
        assert!(a.children.contains(b.id), "{backend}");
        assert!(b.parents.contains(a.id), "{backend}");
        assert_eq!(store.to_be_cached().unwrap(), vec![a.id, b.id], "{backend}");
    }
}

#[test]
fn set_dependency_is_idempotent_including_dirty_membership() {
    for (backend, store) in backends() {
        let a = add_node(store.as_ref(), LIBRARY, "a", Vec::new()).unwrap();
        let b = add_node(store.as_ref(), LIBRARY, "b", Vec::new()).unwrap();

        set_dependency(store.as_ref(), a.id, b.id).unwrap();
        store.mark_clean(a.id).unwrap();
        store.mark_clean(b.id).unwrap();

        // Re-adding the edge must not touch the dirty set.
        set_dependency(store.as_ref(), a.id, b.id).unwrap();
        assert!(store.to_be_cached().unwrap().is_empty(), "{backend}");

        let a = store.node(a.id).unwrap();
        assert_eq!(a.children.len(), 1, "{backend}");
    }
}

#[test]
fn set_dependency_rejects_self_loops() {
    for (backend, store) in backends() {
        let a = add_node(store.as_ref(), LIBRARY, "a", Vec::new()).unwrap();
        assert!(
            matches!(
                set_dependency(store.as_ref(), a.id, a.id),
                Err(GraphError::InvalidArgument(_))
            ),
            "{backend}"
        );
    }
}

#[test]
fn batched_reads_preserve_order_and_omit_missing() {
    for (backend, store) in backends() {
        let a = add_node(store.as_ref(), LIBRARY, "a", Vec::new()).unwrap();
        let b = add_node(store.as_ref(), LIBRARY, "b", Vec::new()).unwrap();

        let fetched = store.nodes(&[b.id, 999, a.id]).unwrap();
        let names: Vec<&str> = fetched.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"], "{backend}");
    }
}

#[test]
fn glob_search_covers_both_wildcards() {
    for (backend, store) in backends() {
        for name in ["pkg:cargo/serde@1.0.0", "pkg:cargo/tokio@1.37.0", "pkg:npm/left-pad@1.3.0"] {
            add_node(store.as_ref(), LIBRARY, name, Vec::new()).unwrap();
        }

        let cargo = store.nodes_by_glob("pkg:cargo/*").unwrap();
        assert_eq!(cargo.len(), 2, "{backend}");

        let everything = store.nodes_by_glob("*").unwrap();
        assert_eq!(everything.len(), 3, "{backend}");

        let single = store.nodes_by_glob("pkg:npm/left-pa?@1.3.0").unwrap();
        assert_eq!(single.len(), 1, "{backend}");

        assert!(
            matches!(store.nodes_by_glob(""), Err(GraphError::InvalidArgument(_))),
            "{backend}"
        );
    }
}

#[test]
fn unknown_name_is_not_found() {
    for (backend, store) in backends() {
        assert!(
            matches!(store.name_to_id("ghost"), Err(GraphError::NotFound(_))),
            "{backend}"
        );
    }
}
