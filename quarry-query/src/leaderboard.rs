// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Leaderboard Evaluator
//!
//! Runs one script across the entire node population, the reserved `focus`
//! name bound to each node in turn, and ranks nodes by the cardinality of
//! their output set. This is how "which package has the largest blast
//! radius?" and "which package pulls in the most vulnerabilities?" get
//! answered in one call.
//!
//! ## Protocol
//!
//! 1. Parse the script once; a malformed script fails before any fan-out.
//! 2. Load one [`GraphSnapshot`]; a dirty graph fails with `NotCached`.
//! 3. Feed every named node through a channel to a pool of at most
//!    `concurrency` scoped worker threads.
//! 4. Workers always drain: the pool is joined and the result channel
//!    emptied before any error is surfaced, so an evaluation failure that
//!    lands late can never be lost. The first recorded error wins and
//!    cancels outstanding work through the caller's token.
//! 5. Rank results on a heap keyed by (cardinality descending, name
//!    ascending), deterministic regardless of worker completion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::Mutex;

use quarry_core::{CancelToken, GraphError, GraphStore, Node, Result};

use crate::eval::{evaluate, GraphSnapshot};
use crate::parser::parse;

/// One ranked row: a node and the IDs its evaluation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub node: Node,
    pub output: Vec<u32>,
}

/// Evaluate `script` with every named node as focus, under at most
/// `concurrency` concurrent evaluations, ranked by output cardinality.
///
/// On any evaluation failure the caller's token is cancelled to abort
/// outstanding work and the first observed error is returned; a leaderboard
/// cancelled from outside returns [`GraphError::Cancelled`] with no partial
/// results.
pub fn custom_leaderboard(
    store: &dyn GraphStore,
    script: &str,
    concurrency: usize,
    cancel: &CancelToken,
) -> Result<Vec<LeaderboardEntry>> {
    if concurrency == 0 {
        return Err(GraphError::InvalidArgument(
            "leaderboard concurrency must be at least 1".into(),
        ));
    }

    let expr = parse(script)?;
    let snapshot = GraphSnapshot::load(store)?;
    if !snapshot.is_clean() {
        return Err(GraphError::NotCached);
    }

    let (work_tx, work_rx) = crossbeam_channel::unbounded::<&Node>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<LeaderboardEntry>();
    let first_error: Mutex<Option<GraphError>> = Mutex::new(None);

    let mut queued = 0usize;
    for node in snapshot.iter_nodes().filter(|node| !node.name.is_empty()) {
        work_tx.send(node).map_err(|_| {
            GraphError::Internal("leaderboard work channel closed prematurely".into())
        })?;
        queued += 1;
    }
    drop(work_tx);
    tracing::debug!(nodes = queued, concurrency, "starting leaderboard fan-out");

    std::thread::scope(|scope| {
        for _ in 0..concurrency.min(queued.max(1)) {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let expr = &expr;
            let snapshot = &snapshot;
            let first_error = &first_error;
            scope.spawn(move || {
                while let Ok(node) = work_rx.recv() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    match evaluate(expr, snapshot, Some(&node.name), cancel) {
                        Ok(output) => {
                            let entry = LeaderboardEntry {
                                node: node.clone(),
                                output: output.to_vec(),
                            };
                            if result_tx.send(entry).is_err() {
                                break;
                            }
                        }
                        Err(GraphError::Cancelled) => break,
                        Err(err) => {
                            let mut slot = first_error.lock();
                            if slot.is_none() {
                                *slot = Some(err);
                            }
                            drop(slot);
                            cancel.cancel();
                            break;
                        }
                    }
                }
            });
        }
    });
    drop(result_tx);

    if let Some(err) = first_error.into_inner() {
        return Err(err);
    }
    cancel.check()?;

    let mut heap: BinaryHeap<Ranked> = result_rx.try_iter().map(Ranked).collect();
    let mut rows = Vec::with_capacity(heap.len());
    while let Some(Ranked(entry)) = heap.pop() {
        rows.push(entry);
    }
    Ok(rows)
}

/// Orders entries so that popping a max-heap yields descending cardinality
/// with ties broken by ascending node name.
struct Ranked(LeaderboardEntry);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .output
            .len()
            .cmp(&other.0.output.len())
            .then_with(|| other.0.node.name.cmp(&self.0.node.name))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}
