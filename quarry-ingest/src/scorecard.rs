// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! OpenSSF scorecard ingestion.
//!
//! Scorecards arrive keyed by package, not by package *version*, so they
//! cannot be attached to nodes in one step. Ingestion is two-phase:
//!
//! 1. [`load_scorecards`] stages each successful result in custom data,
//!    keyed by the versionless purl, subkeyed by repository name.
//! 2. [`apply_scorecards`] walks the `library` nodes, looks up staged
//!    results for each node's versionless purl, and attaches a `scorecard`
//!    node (edge library → scorecard) wherever the staged result's version
//!    matches the node's.
//!
//! Re-running either phase is harmless: staging overwrites by subkey, and
//! attaching reuses existing scorecard nodes and edges.

use serde::{Deserialize, Serialize};

use quarry_core::node::{add_node, set_dependency};
use quarry_core::{GraphError, GraphStore, Result, LIBRARY, SCORECARD};

/// One scorecard run for one package, as emitted by the scorecard API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardResult {
    pub purl: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub scorecard: ScorecardData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorecardData {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub repo: Repo,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub commit: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Check {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub reason: String,
}

/// Phase one: stage successful scorecard results into custom data.
/// Returns the number staged.
pub fn load_scorecards(store: &dyn GraphStore, data: &[u8]) -> Result<usize> {
    if data.is_empty() {
        return Err(GraphError::InvalidArgument(
            "scorecard document is empty".into(),
        ));
    }
    let results: Vec<ScorecardResult> = serde_json::from_slice(data)
        .map_err(|err| GraphError::InvalidArgument(format!("malformed scorecard data: {err}")))?;

    let mut staged = 0usize;
    for result in &results {
        if !result.success || result.purl.is_empty() {
            continue;
        }
        let blob = serde_json::to_vec(result)
            .map_err(|err| GraphError::Internal(format!("re-encoding scorecard: {err}")))?;
        store.put_custom_data(
            SCORECARD,
            purl_base(&result.purl),
            &result.scorecard.repo.name,
            &blob,
        )?;
        staged += 1;
    }
    Ok(staged)
}

/// Phase two: attach staged scorecards to matching library nodes.
/// Returns the number of edges created.
pub fn apply_scorecards(store: &dyn GraphStore) -> Result<usize> {
    let ids = store.all_ids()?;
    let nodes = store.nodes(&ids)?;

    let mut attached = 0usize;
    for node in &nodes {
        if node.kind != LIBRARY {
            continue;
        }
        let staged = match store.custom_data(SCORECARD, purl_base(&node.name)) {
            Ok(staged) => staged,
            Err(GraphError::NotFound(_)) => continue,
            Err(err) => return Err(err),
        };

        for blob in staged.values() {
            let result: ScorecardResult = serde_json::from_slice(blob)
                .map_err(|err| GraphError::Internal(format!("staged scorecard: {err}")))?;

            // Staged by package; only attach to the matching version.
            if purl_version(&result.purl) != purl_version(&node.name) {
                continue;
            }

            let scorecard = ensure_scorecard(store, &result)?;
            set_dependency(store, node.id, scorecard.id)?;
            attached += 1;
        }
    }

    tracing::debug!(attached, "applied scorecards");
    Ok(attached)
}

fn ensure_scorecard(
    store: &dyn GraphStore,
    result: &ScorecardResult,
) -> Result<quarry_core::Node> {
    let name = format!("scorecard:{}", result.purl);
    let metadata = serde_json::to_vec(result)
        .map_err(|err| GraphError::Internal(format!("re-encoding scorecard: {err}")))?;
    match add_node(store, SCORECARD, &name, metadata) {
        Ok(node) => Ok(node),
        Err(GraphError::AlreadyExists(_)) => {
            let id = store.name_to_id(&name)?;
            store.node(id)
        }
        Err(err) => Err(err),
    }
}

/// The purl without its version qualifier.
fn purl_base(purl: &str) -> &str {
    purl.rsplit_once('@').map_or(purl, |(base, _)| base)
}

/// The version qualifier of a purl, if any.
fn purl_version(purl: &str) -> Option<&str> {
    purl.rsplit_once('@').map(|(_, version)| version)
}
