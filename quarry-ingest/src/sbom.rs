// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! CycloneDX SBOM ingestion.
//!
//! Components with a purl become `library` nodes carrying the raw component
//! JSON as metadata; the `dependencies` section becomes edges from dependent
//! to dependency. Refs that never appeared as components still get a
//! placeholder node, so a partial SBOM cannot drop edges.

use serde::Deserialize;
use serde_json::Value;

use quarry_core::node::{add_node, set_dependency};
use quarry_core::{GraphError, GraphStore, Node, Result, LIBRARY};

#[derive(Debug, Deserialize)]
struct CycloneDxBom {
    #[serde(default)]
    components: Vec<Value>,
    #[serde(default)]
    dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Deserialize)]
struct DependencyEntry {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default, rename = "dependsOn")]
    depends_on: Vec<String>,
}

/// Ingest one CycloneDX JSON document. Returns the number of nodes created
/// or re-encountered.
pub fn ingest_sbom(store: &dyn GraphStore, data: &[u8]) -> Result<usize> {
    if data.is_empty() {
        return Err(GraphError::InvalidArgument("sbom document is empty".into()));
    }
    let bom: CycloneDxBom = serde_json::from_slice(data)
        .map_err(|err| GraphError::InvalidArgument(format!("malformed sbom: {err}")))?;

    let mut touched = 0usize;
    for component in &bom.components {
        let Some(purl) = component.get("purl").and_then(Value::as_str) else {
            continue;
        };
        let metadata = serde_json::to_vec(component)
            .map_err(|err| GraphError::Internal(format!("re-encoding component: {err}")))?;
        ensure_library(store, purl, metadata)?;
        touched += 1;
    }

    for entry in &bom.dependencies {
        let dependent = ensure_library(store, &entry.reference, Vec::new())?;
        for reference in &entry.depends_on {
            let dependency = ensure_library(store, reference, Vec::new())?;
            set_dependency(store, dependent.id, dependency.id)?;
        }
    }

    tracing::debug!(
        components = bom.components.len(),
        edges = bom.dependencies.iter().map(|d| d.depends_on.len()).sum::<usize>(),
        "ingested sbom"
    );
    Ok(touched)
}

/// Fetch-or-create a library node by purl.
pub(crate) fn ensure_library(
    store: &dyn GraphStore,
    name: &str,
    metadata: Vec<u8>,
) -> Result<Node> {
    match add_node(store, LIBRARY, name, metadata) {
        Ok(node) => Ok(node),
        Err(GraphError::AlreadyExists(_)) => {
            let id = store.name_to_id(name)?;
            store.node(id)
        }
        Err(err) => Err(err),
    }
}
