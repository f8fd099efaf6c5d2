// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Quarry gRPC — The Remote-Procedure Surface
//!
//! Exposes the graph over tonic: node CRUD, edge insertion, cache passes,
//! queries, leaderboards, and the three ingestion endpoints.
//!
//! The storage layer and the reachability engine are synchronous by design;
//! this crate is the only place the async world appears. Every handler moves
//! its work onto `tokio::task::spawn_blocking` so closure computation and
//! SQLite I/O never stall the tonic executor, and long-running handlers wire
//! request-drop to the engine's cancellation token.

pub mod service;
pub mod status;

/// Generated protobuf/tonic bindings for `quarry.v1`.
pub mod proto {
    tonic::include_proto!("quarry.v1");
}

pub use service::GraphService;
