// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! The `quarry.v1.QuarryService` implementation.
//!
//! Handlers are thin: decode the request, hop onto a blocking thread, call
//! the engine, encode the response. Long-running handlers (cache passes,
//! queries, leaderboards) hold a [`CancelOnDrop`] guard so a client that
//! hangs up stops paying for work nobody will read.

use std::sync::Arc;

use tokio::task;
use tonic::{Request, Response, Status};

use quarry_core::{CancelToken, GraphStore, Node};

use crate::proto;
use crate::proto::quarry_service_server::{QuarryService, QuarryServiceServer};
use crate::status::to_status;

/// The RPC service: a storage handle plus the leaderboard concurrency
/// budget.
pub struct GraphService {
    store: Arc<dyn GraphStore>,
    concurrency: usize,
}

impl GraphService {
    pub fn new(store: Arc<dyn GraphStore>, concurrency: usize) -> Self {
        Self { store, concurrency }
    }

    /// Wrap into the tonic server type for `Server::builder().add_service`.
    pub fn into_server(self) -> QuarryServiceServer<Self> {
        QuarryServiceServer::new(self)
    }
}

fn node_to_proto(node: &Node) -> proto::Node {
    proto::Node {
        id: node.id,
        name: node.name.clone(),
        kind: node.kind.clone(),
        metadata: node.metadata.clone(),
        dependencies: node.children.to_vec(),
        dependents: node.parents.to_vec(),
    }
}

/// Run engine work on the blocking pool and translate both panics and
/// engine errors into a `Status`.
async fn run_blocking<T, F>(work: F) -> Result<T, Status>
where
    F: FnOnce() -> quarry_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|err| Status::internal(format!("blocking worker failed: {err}")))?
        .map_err(to_status)
}

/// Cancels the wrapped token when dropped. Held across an `.await`, this
/// turns a dropped request future into engine-level cancellation.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[tonic::async_trait]
impl QuarryService for GraphService {
    async fn get_node(
        &self,
        request: Request<proto::GetNodeRequest>,
    ) -> Result<Response<proto::GetNodeResponse>, Status> {
        let store = self.store.clone();
        let id = request.into_inner().id;
        let node = run_blocking(move || store.node(id)).await?;
        Ok(Response::new(proto::GetNodeResponse {
            node: Some(node_to_proto(&node)),
        }))
    }

    async fn get_node_by_name(
        &self,
        request: Request<proto::GetNodeByNameRequest>,
    ) -> Result<Response<proto::GetNodeByNameResponse>, Status> {
        let store = self.store.clone();
        let name = request.into_inner().name;
        let node = run_blocking(move || {
            let id = store.name_to_id(&name)?;
            store.node(id)
        })
        .await?;
        Ok(Response::new(proto::GetNodeByNameResponse {
            node: Some(node_to_proto(&node)),
        }))
    }

    async fn get_nodes_by_glob(
        &self,
        request: Request<proto::GetNodesByGlobRequest>,
    ) -> Result<Response<proto::GetNodesByGlobResponse>, Status> {
        let store = self.store.clone();
        let pattern = request.into_inner().pattern;
        let nodes = run_blocking(move || store.nodes_by_glob(&pattern)).await?;
        Ok(Response::new(proto::GetNodesByGlobResponse {
            nodes: nodes.iter().map(node_to_proto).collect(),
        }))
    }

    async fn add_node(
        &self,
        request: Request<proto::AddNodeRequest>,
    ) -> Result<Response<proto::AddNodeResponse>, Status> {
        let store = self.store.clone();
        let message = request.into_inner();
        let node = run_blocking(move || {
            quarry_core::node::add_node(store.as_ref(), &message.kind, &message.name, message.metadata)
        })
        .await?;
        Ok(Response::new(proto::AddNodeResponse {
            node: Some(node_to_proto(&node)),
        }))
    }

    async fn set_dependency(
        &self,
        request: Request<proto::SetDependencyRequest>,
    ) -> Result<Response<proto::SetDependencyResponse>, Status> {
        let store = self.store.clone();
        let message = request.into_inner();
        run_blocking(move || {
            quarry_core::node::set_dependency(store.as_ref(), message.node_id, message.dependency_id)
        })
        .await?;
        Ok(Response::new(proto::SetDependencyResponse {}))
    }

    async fn cache(
        &self,
        _request: Request<proto::CacheRequest>,
    ) -> Result<Response<proto::CacheResponse>, Status> {
        let store = self.store.clone();
        let token = CancelToken::new();
        let _guard = CancelOnDrop(token.clone());
        run_blocking(move || quarry_core::cache::cache(store.as_ref(), &token)).await?;
        Ok(Response::new(proto::CacheResponse {}))
    }

    async fn clear(
        &self,
        _request: Request<proto::ClearRequest>,
    ) -> Result<Response<proto::ClearResponse>, Status> {
        let store = self.store.clone();
        run_blocking(move || store.clear_caches()).await?;
        Ok(Response::new(proto::ClearResponse {}))
    }

    async fn query(
        &self,
        request: Request<proto::QueryRequest>,
    ) -> Result<Response<proto::QueryResponse>, Status> {
        let store = self.store.clone();
        let script = request.into_inner().script;
        let token = CancelToken::new();
        let _guard = CancelOnDrop(token.clone());
        let nodes =
            run_blocking(move || quarry_query::query(store.as_ref(), &script, &token)).await?;
        Ok(Response::new(proto::QueryResponse {
            nodes: nodes.iter().map(node_to_proto).collect(),
        }))
    }

    async fn custom_leaderboard(
        &self,
        request: Request<proto::CustomLeaderboardRequest>,
    ) -> Result<Response<proto::CustomLeaderboardResponse>, Status> {
        let store = self.store.clone();
        let script = request.into_inner().script;
        let concurrency = self.concurrency;
        let token = CancelToken::new();
        let _guard = CancelOnDrop(token.clone());
        let rows = run_blocking(move || {
            quarry_query::custom_leaderboard(store.as_ref(), &script, concurrency, &token)
        })
        .await?;
        Ok(Response::new(proto::CustomLeaderboardResponse {
            rows: rows
                .into_iter()
                .map(|entry| proto::LeaderboardRow {
                    node: Some(node_to_proto(&entry.node)),
                    output: entry.output,
                })
                .collect(),
        }))
    }

    async fn all_keys(
        &self,
        _request: Request<proto::AllKeysRequest>,
    ) -> Result<Response<proto::AllKeysResponse>, Status> {
        let store = self.store.clone();
        let nodes = run_blocking(move || {
            let ids = store.all_ids()?;
            store.nodes(&ids)
        })
        .await?;
        Ok(Response::new(proto::AllKeysResponse {
            nodes: nodes.iter().map(node_to_proto).collect(),
        }))
    }

    async fn ingest_sbom(
        &self,
        request: Request<proto::IngestSbomRequest>,
    ) -> Result<Response<proto::IngestSbomResponse>, Status> {
        let store = self.store.clone();
        let sbom = request.into_inner().sbom;
        let touched =
            run_blocking(move || quarry_ingest::ingest_sbom(store.as_ref(), &sbom)).await?;
        Ok(Response::new(proto::IngestSbomResponse {
            nodes_touched: touched as u32,
        }))
    }

    async fn ingest_vulnerability(
        &self,
        request: Request<proto::IngestVulnerabilityRequest>,
    ) -> Result<Response<proto::IngestVulnerabilityResponse>, Status> {
        let store = self.store.clone();
        let advisory = request.into_inner().vulnerability;
        let linked =
            run_blocking(move || quarry_ingest::ingest_vulnerability(store.as_ref(), &advisory))
                .await?;
        Ok(Response::new(proto::IngestVulnerabilityResponse {
            packages_linked: linked as u32,
        }))
    }

    async fn ingest_scorecard(
        &self,
        request: Request<proto::IngestScorecardRequest>,
    ) -> Result<Response<proto::IngestScorecardResponse>, Status> {
        let store = self.store.clone();
        let scorecard = request.into_inner().scorecard;
        let (staged, attached) = run_blocking(move || {
            let staged = quarry_ingest::load_scorecards(store.as_ref(), &scorecard)?;
            let attached = quarry_ingest::apply_scorecards(store.as_ref())?;
            Ok((staged, attached))
        })
        .await?;
        Ok(Response::new(proto::IngestScorecardResponse {
            results_staged: staged as u32,
            scorecards_attached: attached as u32,
        }))
    }

    async fn check(
        &self,
        _request: Request<proto::CheckRequest>,
    ) -> Result<Response<proto::CheckResponse>, Status> {
        Ok(Response::new(proto::CheckResponse {
            status: "ok".into(),
        }))
    }
}
