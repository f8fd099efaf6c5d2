// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! Error taxonomy shared by every layer of the engine.
//!
//! Kinds are stable across layers: a `NotFound` raised by a storage backend
//! is still a `NotFound` when it leaves the RPC boundary, with detail strings
//! enriched along the way. The RPC crate maps each kind to exactly one status
//! code.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Every failure the engine can surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A node, cache entry, or custom-data record is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A node with the same name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Malformed input: empty name, bad glob, self-loop dependency.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The dirty set is non-empty; reachability answers would be stale.
    #[error("graph has uncached nodes, run a cache pass first")]
    NotCached,

    /// The query script violates the grammar.
    #[error("parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    /// The query references a name absent from storage.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A backend failure; the caller may retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated; not recoverable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GraphError {
    /// Shorthand for a parse failure anchored at a byte offset.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        GraphError::Parse {
            position,
            message: message.into(),
        }
    }
}
