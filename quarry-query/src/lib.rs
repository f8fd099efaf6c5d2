// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Quarry Query — Set Algebra over Cached Reachability
//!
//! A small expression language whose atoms are closure-cache reads and whose
//! operators are set algebra:
//!
//! ```text
//! dependencies library pkg:cargo/serde@1.0.0 and dependents library pkg:cargo/tokio@1.37.0
//! (dependencies * A) xor (dependencies * B)
//! ```
//!
//! Because every atom resolves to a precomputed bitset, evaluation is a
//! handful of word-parallel set operations regardless of graph size. That
//! is what makes the [`leaderboard`] affordable: the same script runs once
//! per node in the graph, with the reserved `focus` name bound to each node
//! in turn, under a bounded worker pool.
//!
//! ## Pipeline
//!
//! ```text
//! script ──parse──▶ Expr ──evaluate──▶ NodeSet ──materialize──▶ [Node]
//!                      ▲
//!                GraphSnapshot (nodes + caches + name index, loaded once)
//! ```
//!
//! Evaluation requires a clean graph: the snapshot captures whether the
//! dirty set was empty at load time, and every evaluation gates on it.

pub mod eval;
pub mod leaderboard;
pub mod parser;

pub use eval::{evaluate, query, GraphSnapshot};
pub use leaderboard::{custom_leaderboard, LeaderboardEntry};
pub use parser::{parse, Expr, Reach, SetOp, FOCUS_TOKEN};
