// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # SQLite Backend
//!
//! Single-file persistence behind the [`GraphStore`] contract. Four tables:
//!
//! | Table         | Contents                                             |
//! |---------------|------------------------------------------------------|
//! | `nodes`       | id, name (UNIQUE), kind, metadata, adjacency bitsets |
//! | `caches`      | id, `all_children` / `all_parents` closure bitsets   |
//! | `dirty`       | the to-be-cached set                                 |
//! | `custom_data` | staged ingest blobs keyed `(kind, key, subkey)`      |
//!
//! Bitsets are stored in their portable serialized form, so a database
//! written by one process is readable by any other build. ID assignment
//! rides on `AUTOINCREMENT`, which never reuses rowids and so satisfies the
//! monotonic-ID requirement of the contract.
//!
//! A single `Mutex<Connection>` serializes statements; the contract only
//! asks for per-key atomicity, so one writer at a time is sufficient and
//! keeps the backend free of busy-handler tuning.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use quarry_core::{GraphError, GraphStore, Node, NodeSet, ReachCache, Result};

use crate::glob;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL UNIQUE,
    kind     TEXT NOT NULL,
    metadata BLOB NOT NULL,
    children BLOB NOT NULL,
    parents  BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS caches (
    id           INTEGER PRIMARY KEY,
    all_children BLOB NOT NULL,
    all_parents  BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS dirty (
    id INTEGER PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS custom_data (
    kind   TEXT NOT NULL,
    key    TEXT NOT NULL,
    subkey TEXT NOT NULL,
    data   BLOB NOT NULL,
    PRIMARY KEY (kind, key, subkey)
);
";

/// A SQLite-backed graph store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(db_err)?;
        tracing::debug!(path = %path.display(), "opened graph database");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database. Used by tests and tooling.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GraphStore for SqliteStore {
    fn save_node(&self, node: &mut Node) -> Result<()> {
        let conn = self.conn.lock();
        if node.id == 0 {
            conn.execute(
                "INSERT INTO nodes (name, kind, metadata, children, parents)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    node.name,
                    node.kind,
                    node.metadata,
                    node.children.to_bytes(),
                    node.parents.to_bytes(),
                ],
            )
            .map_err(|err| save_err(&node.name, err))?;
            node.id = conn.last_insert_rowid() as u32;
        } else {
            conn.execute(
                "INSERT INTO nodes (id, name, kind, metadata, children, parents)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     kind = excluded.kind,
                     metadata = excluded.metadata,
                     children = excluded.children,
                     parents = excluded.parents",
                params![
                    node.id,
                    node.name,
                    node.kind,
                    node.metadata,
                    node.children.to_bytes(),
                    node.parents.to_bytes(),
                ],
            )
            .map_err(|err| save_err(&node.name, err))?;
        }
        conn.execute("INSERT OR IGNORE INTO dirty (id) VALUES (?1)", params![node.id])
            .map_err(db_err)?;
        Ok(())
    }

    fn node(&self, id: u32) -> Result<Node> {
        let conn = self.conn.lock();
        fetch_node(&conn, id)?.ok_or_else(|| GraphError::NotFound(format!("node {id}")))
    }

    fn nodes(&self, ids: &[u32]) -> Result<Vec<Node>> {
        let conn = self.conn.lock();
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(node) = fetch_node(&conn, id)? {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn name_to_id(&self, name: &str) -> Result<u32> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id FROM nodes WHERE name = ?1",
            params![name],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map_err(db_err)?
        .map(|id| id as u32)
        .ok_or_else(|| GraphError::NotFound(format!("node named {name:?}")))
    }

    fn nodes_by_glob(&self, pattern: &str) -> Result<Vec<Node>> {
        let matcher = glob::compile(pattern)?;
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT id, name FROM nodes ORDER BY id")
            .map_err(db_err)?;
        let matching: Vec<u32> = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)? as u32, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?
            .filter_map(|row| match row {
                Ok((id, name)) if matcher.is_match(&name) => Some(Ok(id)),
                Ok(_) => None,
                Err(err) => Some(Err(db_err(err))),
            })
            .collect::<Result<_>>()?;
        drop(stmt);

        let mut out = Vec::with_capacity(matching.len());
        for id in matching {
            if let Some(node) = fetch_node(&conn, id)? {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn all_ids(&self) -> Result<Vec<u32>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id FROM nodes ORDER BY id")
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(db_err)?
            .map(|row| row.map(|id| id as u32).map_err(db_err))
            .collect::<Result<_>>()?;
        Ok(ids)
    }

    fn save_cache(&self, cache: &ReachCache) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO caches (id, all_children, all_parents)
             VALUES (?1, ?2, ?3)",
            params![
                cache.id,
                cache.all_children.to_bytes(),
                cache.all_parents.to_bytes(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn cache(&self, id: u32) -> Result<ReachCache> {
        let conn = self.conn.lock();
        fetch_cache(&conn, id)?
            .ok_or_else(|| GraphError::NotFound(format!("cache for node {id}")))
    }

    fn caches(&self, ids: &[u32]) -> Result<Vec<ReachCache>> {
        let conn = self.conn.lock();
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(cache) = fetch_cache(&conn, id)? {
                out.push(cache);
            }
        }
        Ok(out)
    }

    fn to_be_cached(&self) -> Result<Vec<u32>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id FROM dirty ORDER BY id")
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(db_err)?
            .map(|row| row.map(|id| id as u32).map_err(db_err))
            .collect::<Result<_>>()?;
        Ok(ids)
    }

    fn mark_dirty(&self, id: u32) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("INSERT OR IGNORE INTO dirty (id) VALUES (?1)", params![id])
            .map_err(db_err)?;
        Ok(())
    }

    fn mark_clean(&self, id: u32) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM dirty WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(())
    }

    fn clear_caches(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "DELETE FROM caches;
             INSERT OR IGNORE INTO dirty (id) SELECT id FROM nodes;",
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn put_custom_data(&self, kind: &str, key: &str, subkey: &str, data: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO custom_data (kind, key, subkey, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind, key, subkey, data],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn custom_data(&self, kind: &str, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT subkey, data FROM custom_data WHERE kind = ?1 AND key = ?2")
            .map_err(db_err)?;
        let staged: HashMap<String, Vec<u8>> = stmt
            .query_map(params![kind, key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(db_err)?
            .map(|row| row.map_err(db_err))
            .collect::<Result<_>>()?;

        if staged.is_empty() {
            return Err(GraphError::NotFound(format!("custom data {kind}/{key}")));
        }
        Ok(staged)
    }
}

fn fetch_node(conn: &Connection, id: u32) -> Result<Option<Node>> {
    let row = conn
        .query_row(
            "SELECT name, kind, metadata, children, parents FROM nodes WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;

    let Some((name, kind, metadata, children, parents)) = row else {
        return Ok(None);
    };
    Ok(Some(Node {
        id,
        name,
        kind,
        metadata,
        children: NodeSet::from_bytes(&children)?,
        parents: NodeSet::from_bytes(&parents)?,
    }))
}

fn fetch_cache(conn: &Connection, id: u32) -> Result<Option<ReachCache>> {
    let row = conn
        .query_row(
            "SELECT all_children, all_parents FROM caches WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )
        .optional()
        .map_err(db_err)?;

    let Some((all_children, all_parents)) = row else {
        return Ok(None);
    };
    Ok(Some(ReachCache {
        id,
        all_children: NodeSet::from_bytes(&all_children)?,
        all_parents: NodeSet::from_bytes(&all_parents)?,
    }))
}

fn db_err(err: rusqlite::Error) -> GraphError {
    GraphError::Storage(format!("sqlite: {err}"))
}

/// Distinguish name-uniqueness violations from other backend failures.
fn save_err(name: &str, err: rusqlite::Error) -> GraphError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            GraphError::AlreadyExists(name.to_string())
        }
        _ => db_err(err),
    }
}
