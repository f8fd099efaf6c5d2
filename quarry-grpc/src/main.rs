// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! Quarry gRPC server binary.
//!
//! ```bash
//! # In-memory graph on the default port
//! quarry-server
//!
//! # Persistent graph, custom bind, wider leaderboard pool
//! quarry-server --storage sqlite --storage-path quarry.db \
//!     --host 0.0.0.0 --port 50051 --concurrency 32
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quarry_core::GraphStore;
use quarry_grpc::GraphService;
use quarry_storage::{MemoryStore, SqliteStore};

/// Quarry supply-chain graph server.
#[derive(Parser, Debug)]
#[command(name = "quarry-server")]
#[command(about = "Serve graph operations, queries, and leaderboards over gRPC")]
#[command(version)]
struct Args {
    /// Host address to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, default_value = "50051")]
    port: u16,

    /// Storage backend.
    #[arg(long, value_enum, default_value_t = StorageKind::Memory)]
    storage: StorageKind,

    /// Database file for the sqlite backend.
    #[arg(long)]
    storage_path: Option<PathBuf>,

    /// Maximum concurrent leaderboard evaluations.
    #[arg(long, default_value = "10")]
    concurrency: usize,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StorageKind {
    Memory,
    Sqlite,
}

fn build_store(args: &Args) -> Result<Arc<dyn GraphStore>, Box<dyn std::error::Error>> {
    match args.storage {
        StorageKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageKind::Sqlite => {
            let path = args
                .storage_path
                .as_ref()
                .ok_or("--storage-path is required when --storage sqlite is selected")?;
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.concurrency == 0 {
        return Err("--concurrency must be at least 1".into());
    }

    let store = build_store(&args)?;
    let addr = format!("{}:{}", args.host, args.port).parse()?;
    let service = GraphService::new(store, args.concurrency);

    tracing::info!("Starting Quarry gRPC server on {}", addr);
    tracing::info!("Server version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(storage = ?args.storage, concurrency = args.concurrency, "configuration");

    Server::builder()
        .add_service(service.into_server())
        .serve(addr)
        .await?;

    Ok(())
}
