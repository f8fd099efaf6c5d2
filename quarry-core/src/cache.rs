// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Transitive Cache Engine
//!
//! Materializes, for every node, the two closure bitsets `all_children`
//! (everything reachable along dependency edges) and `all_parents`
//! (everything that reaches it), then drains the dirty set.
//!
//! ## Cycles
//!
//! A naive DFS-and-memoize computes wrong closures inside cycles: whichever
//! member finishes first memoizes a partial set that the others then reuse.
//! The engine instead condenses the graph into its strongly connected
//! components (Tarjan), computes closures on the resulting DAG, and projects
//! back: every member of an SCC shares one `all_children` and one
//! `all_parents`, and a non-trivial SCC contains its own members (so a node
//! on a cycle reaches itself).
//!
//! ## Recompute Scope
//!
//! An edge insertion `a → b` changes `all_children` for `a` and everything
//! above it, and `all_parents` for `b` and everything below it. One pass
//! therefore rewrites caches for the *affected set*
//!
//! ```text
//! affected = dirty ∪ ⋃_{d ∈ dirty} (all_children(d) ∪ all_parents(d))
//! ```
//!
//! evaluated on the new topology; untouched nodes keep their valid records.
//!
//! The pass assumes a quiescent topology. A node re-marked dirty by a
//! concurrent edge insertion stays in the dirty set and the caller must
//! invoke [`cache`] again; the engine does not loop internally.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::cancel::CancelToken;
use crate::error::{GraphError, Result};
use crate::nodeset::NodeSet;
use crate::store::{GraphStore, ReachCache};

/// Run one cache pass: compute closures for every node whose reachability
/// may have changed, persist them, and drain the dirty set.
///
/// Storage errors on individual nodes are logged and skipped; those nodes
/// stay dirty and the pass reports a partial failure at the end. Errors
/// reading the topology are fatal to the pass.
pub fn cache(store: &dyn GraphStore, cancel: &CancelToken) -> Result<()> {
    let dirty = store.to_be_cached()?;
    if dirty.is_empty() {
        return Ok(());
    }
    cancel.check()?;

    let ids = store.all_ids()?;
    let nodes = store.nodes(&ids)?;
    tracing::debug!(
        dirty = dirty.len(),
        nodes = nodes.len(),
        "starting cache pass"
    );

    let topo = Topology::snapshot(&nodes);
    let closures = topo.closures();

    // Everything the dirty nodes can reach or be reached from needs a fresh
    // record; nodes outside that set still agree with the topology.
    let mut affected = NodeSet::from_ids(dirty.iter().copied());
    for &id in &dirty {
        if let Some(component) = topo.component_of(id) {
            affected.union_with(&closures.down[component]);
            affected.union_with(&closures.up[component]);
        }
    }

    let mut failures = 0usize;
    for id in affected.iter() {
        cancel.check()?;
        let Some(component) = topo.component_of(id) else {
            continue;
        };
        let record = ReachCache {
            id,
            all_children: closures.down[component].clone(),
            all_parents: closures.up[component].clone(),
        };
        if let Err(err) = store
            .save_cache(&record)
            .and_then(|_| store.mark_clean(id))
        {
            tracing::warn!(node = id, %err, "failed to persist closure record");
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(GraphError::Storage(format!(
            "{failures} node(s) failed to cache and remain dirty"
        )));
    }
    Ok(())
}

/// An in-memory snapshot of the graph topology with its SCC condensation.
struct Topology {
    graph: DiGraph<u32, ()>,
    index_of: HashMap<u32, NodeIndex>,
    /// SCCs in reverse topological order (successors before predecessors).
    components: Vec<Vec<NodeIndex>>,
    /// Component index per graph node.
    component_index: Vec<usize>,
}

/// Per-component closure bitsets, indexed like `Topology::components`.
struct Closures {
    down: Vec<NodeSet>,
    up: Vec<NodeSet>,
}

impl Topology {
    fn snapshot(nodes: &[crate::node::Node]) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), 0);
        let mut index_of = HashMap::with_capacity(nodes.len());
        for node in nodes {
            index_of.insert(node.id, graph.add_node(node.id));
        }
        for node in nodes {
            let from = index_of[&node.id];
            for child in node.children.iter() {
                if let Some(&to) = index_of.get(&child) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let components = tarjan_scc(&graph);
        let mut component_index = vec![0usize; graph.node_count()];
        for (ci, members) in components.iter().enumerate() {
            for &ix in members {
                component_index[ix.index()] = ci;
            }
        }

        Self {
            graph,
            index_of,
            components,
            component_index,
        }
    }

    fn component_of(&self, id: u32) -> Option<usize> {
        self.index_of.get(&id).map(|ix| self.component_index[ix.index()])
    }

    /// Compute per-component closures on the condensation.
    fn closures(&self) -> Closures {
        let count = self.components.len();

        // Tarjan emits components in reverse topological order, so every
        // successor component's closure exists before we union it in.
        let mut down: Vec<NodeSet> = Vec::with_capacity(count);
        for (ci, members) in self.components.iter().enumerate() {
            let mut set = NodeSet::new();
            if members.len() > 1 {
                for &ix in members {
                    set.insert(self.graph[ix]);
                }
            }
            for &ix in members {
                for succ in self.graph.neighbors_directed(ix, Direction::Outgoing) {
                    let sc = self.component_index[succ.index()];
                    if sc == ci {
                        continue;
                    }
                    set.insert(self.graph[succ]);
                    set.union_with(&down[sc]);
                }
            }
            down.push(set);
        }

        // Reversed order gives predecessors first for the upward closure.
        let mut up: Vec<NodeSet> = vec![NodeSet::new(); count];
        for (ci, members) in self.components.iter().enumerate().rev() {
            let mut set = NodeSet::new();
            if members.len() > 1 {
                for &ix in members {
                    set.insert(self.graph[ix]);
                }
            }
            for &ix in members {
                for pred in self.graph.neighbors_directed(ix, Direction::Incoming) {
                    let pc = self.component_index[pred.index()];
                    if pc == ci {
                        continue;
                    }
                    set.insert(self.graph[pred]);
                    set.union_with(&up[pc]);
                }
            }
            up[ci] = set;
        }

        Closures { down, up }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn node(id: u32, children: &[u32], parents: &[u32]) -> Node {
        Node {
            id,
            name: format!("n{id}"),
            kind: crate::node::LIBRARY.into(),
            metadata: Vec::new(),
            children: NodeSet::from_ids(children.iter().copied()),
            parents: NodeSet::from_ids(parents.iter().copied()),
        }
    }

    fn closure_for(topo: &Topology, closures: &Closures, id: u32) -> (Vec<u32>, Vec<u32>) {
        let ci = topo.component_of(id).unwrap();
        (closures.down[ci].to_vec(), closures.up[ci].to_vec())
    }

    #[test]
    fn test_linear_chain_closures() {
        let nodes = vec![node(1, &[2], &[]), node(2, &[3], &[1]), node(3, &[], &[2])];
        let topo = Topology::snapshot(&nodes);
        let closures = topo.closures();

        assert_eq!(closure_for(&topo, &closures, 1), (vec![2, 3], vec![]));
        assert_eq!(closure_for(&topo, &closures, 2), (vec![3], vec![1]));
        assert_eq!(closure_for(&topo, &closures, 3), (vec![], vec![1, 2]));
    }

    #[test]
    fn test_diamond_closures() {
        let nodes = vec![
            node(1, &[2, 3], &[]),
            node(2, &[4], &[1]),
            node(3, &[4], &[1]),
            node(4, &[], &[2, 3]),
        ];
        let topo = Topology::snapshot(&nodes);
        let closures = topo.closures();

        assert_eq!(closure_for(&topo, &closures, 1).0, vec![2, 3, 4]);
        assert_eq!(closure_for(&topo, &closures, 4).1, vec![1, 2, 3]);
    }

    #[test]
    fn test_cycle_members_share_closures_and_contain_themselves() {
        let nodes = vec![
            node(1, &[2], &[2]),
            node(2, &[1], &[1]),
        ];
        let topo = Topology::snapshot(&nodes);
        let closures = topo.closures();

        let (down1, up1) = closure_for(&topo, &closures, 1);
        let (down2, up2) = closure_for(&topo, &closures, 2);
        assert_eq!(down1, vec![1, 2]);
        assert_eq!(down1, down2);
        assert_eq!(up1, vec![1, 2]);
        assert_eq!(up1, up2);
    }

    #[test]
    fn test_cycle_with_tail() {
        // 1 → 2 ⇄ 3, 3 → 4
        let nodes = vec![
            node(1, &[2], &[]),
            node(2, &[3], &[1, 3]),
            node(3, &[2, 4], &[2]),
            node(4, &[], &[3]),
        ];
        let topo = Topology::snapshot(&nodes);
        let closures = topo.closures();

        assert_eq!(closure_for(&topo, &closures, 1).0, vec![2, 3, 4]);
        assert_eq!(closure_for(&topo, &closures, 2).0, vec![2, 3, 4]);
        assert_eq!(closure_for(&topo, &closures, 4).1, vec![1, 2, 3]);
    }

    #[test]
    fn test_children_parents_symmetry() {
        let nodes = vec![
            node(1, &[2, 3], &[]),
            node(2, &[4], &[1]),
            node(3, &[4], &[1]),
            node(4, &[], &[2, 3]),
        ];
        let topo = Topology::snapshot(&nodes);
        let closures = topo.closures();

        for a in 1..=4u32 {
            for b in 1..=4u32 {
                let a_down = &closures.down[topo.component_of(a).unwrap()];
                let b_up = &closures.up[topo.component_of(b).unwrap()];
                assert_eq!(
                    a_down.contains(b),
                    b_up.contains(a),
                    "symmetry violated for ({a}, {b})"
                );
            }
        }
    }
}
