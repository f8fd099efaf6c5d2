// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Query Evaluation
//!
//! Evaluation is a pure function of `(snapshot, script, focus)`. The
//! [`GraphSnapshot`] front-loads every batched storage read (all nodes, all
//! closure records, the name index, and whether the dirty set was empty)
//! so that evaluating a script is nothing but map lookups and bitset
//! algebra. That matters for the leaderboard, which evaluates the same
//! script once per node against one shared snapshot.
//!
//! Reachability answers from a stale cache would be silently wrong, so a
//! snapshot taken while the dirty set is non-empty refuses every
//! evaluation with [`GraphError::NotCached`]. Writes that land after the
//! snapshot are invisible by design.

use std::collections::HashMap;

use quarry_core::{CancelToken, GraphError, GraphStore, Node, NodeSet, Result, ANY_KIND};

use crate::parser::{parse, Expr, Reach, SetOp, FOCUS_TOKEN};

/// An immutable view of the graph, loaded once per query or leaderboard.
pub struct GraphSnapshot {
    nodes: HashMap<u32, Node>,
    caches: HashMap<u32, NodeClosures>,
    names: HashMap<String, u32>,
    clean: bool,
}

struct NodeClosures {
    all_children: NodeSet,
    all_parents: NodeSet,
}

impl GraphSnapshot {
    /// Load every node and closure record from storage.
    ///
    /// The clean flag is captured here, once; closure records are only
    /// loaded when the graph is clean (they would be unusable otherwise).
    pub fn load(store: &dyn GraphStore) -> Result<Self> {
        let ids = store.all_ids()?;
        let nodes = store.nodes(&ids)?;
        let clean = store.to_be_cached()?.is_empty();

        let mut caches = HashMap::new();
        if clean {
            caches.reserve(ids.len());
            for record in store.caches(&ids)? {
                caches.insert(
                    record.id,
                    NodeClosures {
                        all_children: record.all_children,
                        all_parents: record.all_parents,
                    },
                );
            }
        }

        let mut names = HashMap::with_capacity(nodes.len());
        let mut by_id = HashMap::with_capacity(nodes.len());
        for node in nodes {
            names.insert(node.name.clone(), node.id);
            by_id.insert(node.id, node);
        }

        Ok(Self {
            nodes: by_id,
            caches,
            names,
            clean,
        })
    }

    /// Was the dirty set empty when this snapshot was taken?
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.clean
    }

    /// Look up a node by ID.
    #[inline]
    pub fn node(&self, id: u32) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Iterate every node in the snapshot.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Materialize a result set as nodes, ascending by ID.
    pub fn materialize(&self, set: &NodeSet) -> Vec<Node> {
        set.iter()
            .filter_map(|id| self.nodes.get(&id).cloned())
            .collect()
    }
}

/// Evaluate a parsed expression against a snapshot.
///
/// `focus` binds the reserved [`FOCUS_TOKEN`] name; passing `None` (a plain
/// query) makes the token an error. Cancellation is checked once per atom.
pub fn evaluate(
    expr: &Expr,
    snapshot: &GraphSnapshot,
    focus: Option<&str>,
    cancel: &CancelToken,
) -> Result<NodeSet> {
    if !snapshot.is_clean() {
        return Err(GraphError::NotCached);
    }
    eval_expr(expr, snapshot, focus, cancel)
}

fn eval_expr(
    expr: &Expr,
    snapshot: &GraphSnapshot,
    focus: Option<&str>,
    cancel: &CancelToken,
) -> Result<NodeSet> {
    cancel.check()?;
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            let left = eval_expr(lhs, snapshot, focus, cancel)?;
            let right = eval_expr(rhs, snapshot, focus, cancel)?;
            Ok(match op {
                SetOp::Or => left.union(&right),
                SetOp::And => left.intersect(&right),
                SetOp::Xor => left.xor(&right),
            })
        }
        Expr::Atom {
            reach,
            kind,
            name,
            position,
        } => {
            let name = if name == FOCUS_TOKEN {
                focus.ok_or_else(|| {
                    GraphError::InvalidArgument(format!(
                        "the '{FOCUS_TOKEN}' name (at byte {position}) is only bound during a leaderboard"
                    ))
                })?
            } else {
                name.as_str()
            };

            let id = *snapshot
                .names
                .get(name)
                .ok_or_else(|| GraphError::UnknownNode(name.to_string()))?;
            let closures = snapshot
                .caches
                .get(&id)
                .ok_or(GraphError::NotCached)?;

            let full = match reach {
                Reach::Dependencies => &closures.all_children,
                Reach::Dependents => &closures.all_parents,
            };
            if kind == ANY_KIND {
                return Ok(full.clone());
            }

            let mut filtered = NodeSet::new();
            for id in full.iter() {
                if snapshot.node(id).is_some_and(|node| node.kind == *kind) {
                    filtered.insert(id);
                }
            }
            Ok(filtered)
        }
    }
}

/// Parse and evaluate a script, materializing the result as nodes.
///
/// This is the plain (non-leaderboard) query entry point used by the RPC
/// surface.
pub fn query(store: &dyn GraphStore, script: &str, cancel: &CancelToken) -> Result<Vec<Node>> {
    let expr = parse(script)?;
    let snapshot = GraphSnapshot::load(store)?;
    let result = evaluate(&expr, &snapshot, None, cancel)?;
    Ok(snapshot.materialize(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::cache::cache;
    use quarry_core::node::{add_node, set_dependency};
    use quarry_core::{LIBRARY, VULNERABILITY};
    use quarry_storage::MemoryStore;

    /// a → b → v, plus c with no edges; v is a vulnerability.
    fn fixture() -> (MemoryStore, Vec<Node>) {
        let store = MemoryStore::new();
        let a = add_node(&store, LIBRARY, "a", Vec::new()).unwrap();
        let b = add_node(&store, LIBRARY, "b", Vec::new()).unwrap();
        let v = add_node(&store, VULNERABILITY, "vuln:CVE-2026-1", Vec::new()).unwrap();
        let c = add_node(&store, LIBRARY, "c", Vec::new()).unwrap();
        set_dependency(&store, a.id, b.id).unwrap();
        set_dependency(&store, b.id, v.id).unwrap();
        cache(&store, &CancelToken::new()).unwrap();
        (store, vec![a, b, v, c])
    }

    #[test]
    fn test_atom_with_type_filter() {
        let (store, nodes) = fixture();
        let snapshot = GraphSnapshot::load(&store).unwrap();

        let expr = parse("dependencies library a").unwrap();
        let out = evaluate(&expr, &snapshot, None, &CancelToken::new()).unwrap();
        assert_eq!(out.to_vec(), vec![nodes[1].id]);

        let expr = parse("dependencies * a").unwrap();
        let out = evaluate(&expr, &snapshot, None, &CancelToken::new()).unwrap();
        assert_eq!(out.to_vec(), vec![nodes[1].id, nodes[2].id]);
    }

    #[test]
    fn test_dependents_atom() {
        let (store, nodes) = fixture();
        let snapshot = GraphSnapshot::load(&store).unwrap();

        let expr = parse("dependents library vuln:CVE-2026-1").unwrap();
        let out = evaluate(&expr, &snapshot, None, &CancelToken::new()).unwrap();
        assert_eq!(out.to_vec(), vec![nodes[0].id, nodes[1].id]);
    }

    #[test]
    fn test_set_operators() {
        let (store, nodes) = fixture();
        let snapshot = GraphSnapshot::load(&store).unwrap();
        let token = CancelToken::new();

        let and = parse("dependencies * a and dependencies * b").unwrap();
        assert_eq!(
            evaluate(&and, &snapshot, None, &token).unwrap().to_vec(),
            vec![nodes[2].id]
        );

        let or = parse("dependencies * b or dependents * b").unwrap();
        assert_eq!(
            evaluate(&or, &snapshot, None, &token).unwrap().to_vec(),
            vec![nodes[0].id, nodes[2].id]
        );

        let xor = parse("dependencies * a xor dependencies * b").unwrap();
        assert_eq!(
            evaluate(&xor, &snapshot, None, &token).unwrap().to_vec(),
            vec![nodes[1].id]
        );
    }

    #[test]
    fn test_unknown_name_fails() {
        let (store, _) = fixture();
        let snapshot = GraphSnapshot::load(&store).unwrap();

        let expr = parse("dependencies * ghost").unwrap();
        assert_eq!(
            evaluate(&expr, &snapshot, None, &CancelToken::new()),
            Err(GraphError::UnknownNode("ghost".into()))
        );
    }

    #[test]
    fn test_focus_token_requires_binding() {
        let (store, nodes) = fixture();
        let snapshot = GraphSnapshot::load(&store).unwrap();
        let expr = parse("dependencies * focus").unwrap();

        assert!(matches!(
            evaluate(&expr, &snapshot, None, &CancelToken::new()),
            Err(GraphError::InvalidArgument(_))
        ));

        let bound = evaluate(&expr, &snapshot, Some("a"), &CancelToken::new()).unwrap();
        assert_eq!(bound.to_vec(), vec![nodes[1].id, nodes[2].id]);
    }

    #[test]
    fn test_dirty_snapshot_refuses_evaluation() {
        let (store, nodes) = fixture();
        let d = add_node(&store, LIBRARY, "d", Vec::new()).unwrap();
        set_dependency(&store, nodes[3].id, d.id).unwrap();

        let snapshot = GraphSnapshot::load(&store).unwrap();
        let expr = parse("dependencies * a").unwrap();
        assert_eq!(
            evaluate(&expr, &snapshot, None, &CancelToken::new()),
            Err(GraphError::NotCached)
        );
    }

    #[test]
    fn test_cancellation_observed_between_atoms() {
        let (store, _) = fixture();
        let snapshot = GraphSnapshot::load(&store).unwrap();
        let token = CancelToken::new();
        token.cancel();

        let expr = parse("dependencies * a").unwrap();
        assert_eq!(
            evaluate(&expr, &snapshot, None, &token),
            Err(GraphError::Cancelled)
        );
    }

    #[test]
    fn test_query_materializes_nodes() {
        let (store, _) = fixture();
        let out = query(&store, "dependencies * a", &CancelToken::new()).unwrap();
        let names: Vec<&str> = out.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["b", "vuln:CVE-2026-1"]);
    }
}
