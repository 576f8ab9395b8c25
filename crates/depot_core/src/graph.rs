//! Transactional typed graph session over redb.
//!
//! The session stores labelled vertices (opaque postcard payloads keyed by
//! `(label, key)`), labelled edges between vertex keys, and the two lookup
//! indexes the artifact model needs. Every mutation happens inside a
//! [`GraphWrite`] and becomes visible atomically on [`GraphWrite::commit`];
//! dropping a `GraphWrite` without committing discards all of its changes.

use crate::error::{graph_err, DepotError, Result};
use crate::types::{EdgeLabel, VertexLabel};
use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use std::path::{Path, PathBuf};

/// Graph schema version for migration support.
pub const GRAPH_SCHEMA_VERSION: u32 = 1;

// Table definitions
const METADATA_TABLE: TableDefinition<&str, u32> = TableDefinition::new("metadata");
const VERTEX_TABLE: TableDefinition<(u8, &str), &[u8]> = TableDefinition::new("vertices");
const EDGE_OUT_TABLE: TableDefinition<(u8, &str, &str), ()> = TableDefinition::new("edges_out");
const EDGE_IN_TABLE: TableDefinition<(u8, &str, &str), ()> = TableDefinition::new("edges_in");
const PATH_INDEX_TABLE: TableDefinition<(&str, &str, &str), &str> =
    TableDefinition::new("coordinates_by_path");
const GENERIC_INDEX_TABLE: TableDefinition<(&str, &str), ()> = TableDefinition::new("generic_by_id");

/// Handle to the graph database.
pub struct GraphSession {
    db: Database,
    path: PathBuf,
}

impl GraphSession {
    /// Opens the graph database, creating and initializing it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database can't be opened or has a schema version mismatch.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path).map_err(graph_err("failed to open graph"))?;
        let session = Self { db, path };
        session.initialize()?;
        Ok(session)
    }

    /// Returns the path to the graph database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a read-only snapshot.
    pub fn read(&self) -> Result<GraphRead> {
        let txn = self
            .db
            .begin_read()
            .map_err(graph_err("failed to begin read transaction"))?;
        Ok(GraphRead { txn })
    }

    /// Starts a write transaction. Writers are serialized by the engine.
    pub fn write(&self) -> Result<GraphWrite> {
        let txn = self
            .db
            .begin_write()
            .map_err(graph_err("failed to begin write transaction"))?;
        Ok(GraphWrite { txn })
    }

    fn initialize(&self) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(graph_err("failed to begin write transaction"))?;
        {
            let mut metadata = write_txn
                .open_table(METADATA_TABLE)
                .map_err(graph_err("failed to open metadata table"))?;
            let existing = metadata
                .get("version")
                .map_err(graph_err("failed to read schema version"))?
                .map(|v| v.value());
            match existing {
                Some(version) if version != GRAPH_SCHEMA_VERSION => {
                    return Err(DepotError::Graph(format!(
                        "graph schema version mismatch: found {}, expected {}",
                        version, GRAPH_SCHEMA_VERSION
                    )));
                }
                Some(_) => {}
                None => {
                    metadata
                        .insert("version", GRAPH_SCHEMA_VERSION)
                        .map_err(graph_err("failed to insert version"))?;
                }
            }

            // Create remaining tables so read transactions can open them.
            write_txn
                .open_table(VERTEX_TABLE)
                .map_err(graph_err("failed to open vertex table"))?;
            write_txn
                .open_table(EDGE_OUT_TABLE)
                .map_err(graph_err("failed to open edge table"))?;
            write_txn
                .open_table(EDGE_IN_TABLE)
                .map_err(graph_err("failed to open edge table"))?;
            write_txn
                .open_table(PATH_INDEX_TABLE)
                .map_err(graph_err("failed to open path index"))?;
            write_txn
                .open_table(GENERIC_INDEX_TABLE)
                .map_err(graph_err("failed to open generic index"))?;
        }
        write_txn.commit().map_err(graph_err("failed to commit"))?;
        Ok(())
    }
}

/// Read access shared by snapshots and write transactions.
pub trait GraphView {
    /// Payload of a vertex.
    fn vertex(&self, label: VertexLabel, key: &str) -> Result<Option<Vec<u8>>>;

    /// True when the vertex exists.
    fn has_vertex(&self, label: VertexLabel, key: &str) -> Result<bool> {
        Ok(self.vertex(label, key)?.is_some())
    }

    /// Keys of every vertex with the label.
    fn vertex_keys(&self, label: VertexLabel) -> Result<Vec<String>>;

    /// Targets of outgoing edges.
    fn out_keys(&self, label: EdgeLabel, from: &str) -> Result<Vec<String>>;

    /// Sources of incoming edges.
    fn in_keys(&self, label: EdgeLabel, to: &str) -> Result<Vec<String>>;

    /// Every `(from, to)` pair with the label.
    fn edges(&self, label: EdgeLabel) -> Result<Vec<(String, String)>>;

    /// Artifact key indexed for `(storage, repository, coordinates id)`.
    fn lookup_path(&self, storage_id: &str, repository_id: &str, id: &str) -> Result<Option<String>>;

    /// Every `(coordinates id, artifact key)` of a repository, sorted by id.
    fn repository_entries(&self, storage_id: &str, repository_id: &str) -> Result<Vec<(String, String)>>;

    /// Concrete coordinates keys registered for a generic id.
    fn generic_keys(&self, id: &str) -> Result<Vec<String>>;
}

macro_rules! impl_graph_view {
    ($ty:ty) => {
        impl GraphView for $ty {
            fn vertex(&self, label: VertexLabel, key: &str) -> Result<Option<Vec<u8>>> {
                let table = self
                    .txn
                    .open_table(VERTEX_TABLE)
                    .map_err(graph_err("failed to open vertex table"))?;
                let value = table
                    .get((label as u8, key))
                    .map_err(graph_err("failed to get vertex"))?;
                Ok(value.map(|v| v.value().to_vec()))
            }

            fn vertex_keys(&self, label: VertexLabel) -> Result<Vec<String>> {
                let table = self
                    .txn
                    .open_table(VERTEX_TABLE)
                    .map_err(graph_err("failed to open vertex table"))?;
                let mut keys = Vec::new();
                for entry in table
                    .range((label as u8, "")..)
                    .map_err(graph_err("failed to scan vertices"))?
                {
                    let (k, _) = entry.map_err(graph_err("failed to read vertex"))?;
                    let (l, key) = k.value();
                    if l != label as u8 {
                        break;
                    }
                    keys.push(key.to_string());
                }
                Ok(keys)
            }

            fn out_keys(&self, label: EdgeLabel, from: &str) -> Result<Vec<String>> {
                let table = self
                    .txn
                    .open_table(EDGE_OUT_TABLE)
                    .map_err(graph_err("failed to open edge table"))?;
                scan_adjacent(&table, label, from)
            }

            fn in_keys(&self, label: EdgeLabel, to: &str) -> Result<Vec<String>> {
                let table = self
                    .txn
                    .open_table(EDGE_IN_TABLE)
                    .map_err(graph_err("failed to open edge table"))?;
                scan_adjacent(&table, label, to)
            }

            fn edges(&self, label: EdgeLabel) -> Result<Vec<(String, String)>> {
                let table = self
                    .txn
                    .open_table(EDGE_OUT_TABLE)
                    .map_err(graph_err("failed to open edge table"))?;
                let mut edges = Vec::new();
                for entry in table
                    .range((label as u8, "", "")..)
                    .map_err(graph_err("failed to scan edges"))?
                {
                    let (k, _) = entry.map_err(graph_err("failed to read edge"))?;
                    let (l, from, to) = k.value();
                    if l != label as u8 {
                        break;
                    }
                    edges.push((from.to_string(), to.to_string()));
                }
                Ok(edges)
            }

            fn lookup_path(
                &self,
                storage_id: &str,
                repository_id: &str,
                id: &str,
            ) -> Result<Option<String>> {
                let table = self
                    .txn
                    .open_table(PATH_INDEX_TABLE)
                    .map_err(graph_err("failed to open path index"))?;
                let value = table
                    .get((storage_id, repository_id, id))
                    .map_err(graph_err("failed to get path"))?;
                Ok(value.map(|v| v.value().to_string()))
            }

            fn repository_entries(
                &self,
                storage_id: &str,
                repository_id: &str,
            ) -> Result<Vec<(String, String)>> {
                let table = self
                    .txn
                    .open_table(PATH_INDEX_TABLE)
                    .map_err(graph_err("failed to open path index"))?;
                let mut entries = Vec::new();
                for entry in table
                    .range((storage_id, repository_id, "")..)
                    .map_err(graph_err("failed to scan path index"))?
                {
                    let (k, v) = entry.map_err(graph_err("failed to read path index"))?;
                    let (storage, repository, id) = k.value();
                    if storage != storage_id || repository != repository_id {
                        break;
                    }
                    entries.push((id.to_string(), v.value().to_string()));
                }
                Ok(entries)
            }

            fn generic_keys(&self, id: &str) -> Result<Vec<String>> {
                let table = self
                    .txn
                    .open_table(GENERIC_INDEX_TABLE)
                    .map_err(graph_err("failed to open generic index"))?;
                let mut keys = Vec::new();
                for entry in table
                    .range((id, "")..)
                    .map_err(graph_err("failed to scan generic index"))?
                {
                    let (k, _) = entry.map_err(graph_err("failed to read generic index"))?;
                    let (generic_id, key) = k.value();
                    if generic_id != id {
                        break;
                    }
                    keys.push(key.to_string());
                }
                Ok(keys)
            }
        }
    };
}

/// Read-only snapshot of the graph.
pub struct GraphRead {
    txn: ReadTransaction,
}

/// Write transaction over the graph.
pub struct GraphWrite {
    txn: WriteTransaction,
}

impl_graph_view!(GraphRead);
impl_graph_view!(GraphWrite);

impl GraphWrite {
    /// Inserts or replaces a vertex payload.
    pub fn put_vertex(&mut self, label: VertexLabel, key: &str, payload: &[u8]) -> Result<()> {
        let mut table = self
            .txn
            .open_table(VERTEX_TABLE)
            .map_err(graph_err("failed to open vertex table"))?;
        table
            .insert((label as u8, key), payload)
            .map_err(graph_err("failed to insert vertex"))?;
        Ok(())
    }

    /// Removes a vertex, returning whether it existed.
    ///
    /// Incident edges are left to the caller: edge endpoints are bare keys and
    /// vertices of different labels may share one.
    pub fn remove_vertex(&mut self, label: VertexLabel, key: &str) -> Result<bool> {
        let mut table = self
            .txn
            .open_table(VERTEX_TABLE)
            .map_err(graph_err("failed to open vertex table"))?;
        let removed = table
            .remove((label as u8, key))
            .map_err(graph_err("failed to remove vertex"))?
            .is_some();
        Ok(removed)
    }

    /// Adds an edge; adding an existing edge is a no-op.
    pub fn add_edge(&mut self, label: EdgeLabel, from: &str, to: &str) -> Result<()> {
        {
            let mut out = self
                .txn
                .open_table(EDGE_OUT_TABLE)
                .map_err(graph_err("failed to open edge table"))?;
            out.insert((label as u8, from, to), ())
                .map_err(graph_err("failed to insert edge"))?;
        }
        let mut incoming = self
            .txn
            .open_table(EDGE_IN_TABLE)
            .map_err(graph_err("failed to open edge table"))?;
        incoming
            .insert((label as u8, to, from), ())
            .map_err(graph_err("failed to insert edge"))?;
        Ok(())
    }

    /// Removes an edge, returning whether it existed.
    pub fn remove_edge(&mut self, label: EdgeLabel, from: &str, to: &str) -> Result<bool> {
        let mut out = self
            .txn
            .open_table(EDGE_OUT_TABLE)
            .map_err(graph_err("failed to open edge table"))?;
        let removed = out
            .remove((label as u8, from, to))
            .map_err(graph_err("failed to remove edge"))?
            .is_some();
        drop(out);

        let mut incoming = self
            .txn
            .open_table(EDGE_IN_TABLE)
            .map_err(graph_err("failed to open edge table"))?;
        incoming
            .remove((label as u8, to, from))
            .map_err(graph_err("failed to remove edge"))?;
        Ok(removed)
    }

    /// Maps `(storage, repository, coordinates id)` to an artifact key.
    pub fn put_path(&mut self, storage_id: &str, repository_id: &str, id: &str, artifact_key: &str) -> Result<()> {
        let mut table = self
            .txn
            .open_table(PATH_INDEX_TABLE)
            .map_err(graph_err("failed to open path index"))?;
        table
            .insert((storage_id, repository_id, id), artifact_key)
            .map_err(graph_err("failed to insert path"))?;
        Ok(())
    }

    /// Removes a path index entry.
    pub fn remove_path(&mut self, storage_id: &str, repository_id: &str, id: &str) -> Result<()> {
        let mut table = self
            .txn
            .open_table(PATH_INDEX_TABLE)
            .map_err(graph_err("failed to open path index"))?;
        table
            .remove((storage_id, repository_id, id))
            .map_err(graph_err("failed to remove path"))?;
        Ok(())
    }

    /// Registers a concrete coordinates key under its generic id.
    pub fn put_generic(&mut self, id: &str, coordinates_key: &str) -> Result<()> {
        let mut table = self
            .txn
            .open_table(GENERIC_INDEX_TABLE)
            .map_err(graph_err("failed to open generic index"))?;
        table
            .insert((id, coordinates_key), ())
            .map_err(graph_err("failed to insert generic id"))?;
        Ok(())
    }

    /// Removes a generic id registration.
    pub fn remove_generic(&mut self, id: &str, coordinates_key: &str) -> Result<()> {
        let mut table = self
            .txn
            .open_table(GENERIC_INDEX_TABLE)
            .map_err(graph_err("failed to open generic index"))?;
        table
            .remove((id, coordinates_key))
            .map_err(graph_err("failed to remove generic id"))?;
        Ok(())
    }

    /// Makes every change of this transaction visible at once.
    pub fn commit(self) -> Result<()> {
        self.txn.commit().map_err(graph_err("failed to commit transaction"))
    }
}

/// Collects the far endpoints stored under `(label, near, *)`.
fn scan_adjacent<T>(table: &T, label: EdgeLabel, near: &str) -> Result<Vec<String>>
where
    T: ReadableTable<(u8, &'static str, &'static str), ()>,
{
    let mut keys = Vec::new();
    for entry in table
        .range((label as u8, near, "")..)
        .map_err(graph_err("failed to scan edges"))?
    {
        let (k, _) = entry.map_err(graph_err("failed to read edge"))?;
        let (l, n, far) = k.value();
        if l != label as u8 || n != near {
            break;
        }
        keys.push(far.to_string());
    }
    Ok(keys)
}
