// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! OSV advisory ingestion.
//!
//! An advisory becomes one `vulnerability` node named `vuln:<id>`, carrying
//! the raw advisory JSON as metadata. Every affected package with a purl
//! gets an edge library → vulnerability, so the advisory shows up in
//! `dependencies vulnerability <pkg>` for the package itself *and*, after a
//! cache pass, transitively for everything that depends on it.

use serde::Deserialize;

use quarry_core::node::{add_node, set_dependency};
use quarry_core::{GraphError, GraphStore, Node, Result, VULNERABILITY};

use crate::sbom::ensure_library;

#[derive(Debug, Deserialize)]
struct OsvAdvisory {
    id: String,
    #[serde(default)]
    affected: Vec<Affected>,
}

#[derive(Debug, Deserialize)]
struct Affected {
    #[serde(default)]
    package: Option<OsvPackage>,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    #[serde(default)]
    purl: Option<String>,
}

/// Ingest one OSV JSON advisory. Returns the number of affected packages
/// that were linked.
pub fn ingest_vulnerability(store: &dyn GraphStore, data: &[u8]) -> Result<usize> {
    if data.is_empty() {
        return Err(GraphError::InvalidArgument(
            "vulnerability document is empty".into(),
        ));
    }
    let advisory: OsvAdvisory = serde_json::from_slice(data)
        .map_err(|err| GraphError::InvalidArgument(format!("malformed advisory: {err}")))?;
    if advisory.id.is_empty() {
        return Err(GraphError::InvalidArgument(
            "advisory is missing an id".into(),
        ));
    }

    let vuln = ensure_vulnerability(store, &advisory.id, data.to_vec())?;

    let mut linked = 0usize;
    for affected in &advisory.affected {
        let Some(purl) = affected
            .package
            .as_ref()
            .and_then(|package| package.purl.as_deref())
        else {
            continue;
        };
        let library = ensure_library(store, purl, Vec::new())?;
        set_dependency(store, library.id, vuln.id)?;
        linked += 1;
    }

    tracing::debug!(advisory = %advisory.id, linked, "ingested vulnerability");
    Ok(linked)
}

fn ensure_vulnerability(store: &dyn GraphStore, id: &str, metadata: Vec<u8>) -> Result<Node> {
    let name = format!("vuln:{id}");
    match add_node(store, VULNERABILITY, &name, metadata) {
        Ok(node) => Ok(node),
        Err(GraphError::AlreadyExists(_)) => {
            let id = store.name_to_id(&name)?;
            store.node(id)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::cache::cache;
    use quarry_core::CancelToken;
    use quarry_storage::MemoryStore;

    const ADVISORY: &str = r#"{
        "id": "GHSA-xxxx-2026",
        "summary": "stack overflow on crafted input",
        "affected": [
            {"package": {"purl": "pkg:cargo/flaky@0.3.0", "ecosystem": "crates.io"}},
            {"package": {"purl": "pkg:cargo/flaky@0.4.0", "ecosystem": "crates.io"}},
            {"ranges": []}
        ]
    }"#;

    #[test]
    fn test_advisory_links_affected_packages() {
        let store = MemoryStore::new();
        let linked = ingest_vulnerability(&store, ADVISORY.as_bytes()).unwrap();
        assert_eq!(linked, 2);

        let vuln = store.name_to_id("vuln:GHSA-xxxx-2026").unwrap();
        let library = store
            .node(store.name_to_id("pkg:cargo/flaky@0.3.0").unwrap())
            .unwrap();
        assert!(library.children.contains(vuln));
        assert_eq!(store.node(vuln).unwrap().kind, VULNERABILITY);
    }

    #[test]
    fn test_advisory_for_unknown_package_creates_it() {
        let store = MemoryStore::new();
        ingest_vulnerability(&store, ADVISORY.as_bytes()).unwrap();
        assert!(store.name_to_id("pkg:cargo/flaky@0.4.0").is_ok());
    }

    #[test]
    fn test_advisory_surfaces_transitively_after_caching() {
        let store = MemoryStore::new();
        let app = add_node(&store, quarry_core::LIBRARY, "pkg:cargo/app@1.0.0", Vec::new()).unwrap();
        ingest_vulnerability(&store, ADVISORY.as_bytes()).unwrap();
        let flaky = store.name_to_id("pkg:cargo/flaky@0.3.0").unwrap();
        set_dependency(&store, app.id, flaky).unwrap();

        cache(&store, &CancelToken::new()).unwrap();

        let vuln = store.name_to_id("vuln:GHSA-xxxx-2026").unwrap();
        assert!(store.cache(app.id).unwrap().all_children.contains(vuln));
    }

    #[test]
    fn test_missing_id_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            ingest_vulnerability(&store, br#"{"id": "", "affected": []}"#),
            Err(GraphError::InvalidArgument(_))
        ));
    }
}
