//! Artifact persistence over the graph session.
//!
//! An artifact is written as:
//!
//! - an `Artifact` vertex keyed by its uuid,
//! - for remote artifacts, a `RemoteArtifact` vertex with the same key and a
//!   `RemoteArtifactInheritArtifact` edge,
//! - a concrete coordinates vertex and a `GenericArtifactCoordinates` vertex,
//!   both keyed by `storage:repository:id`, joined by an
//!   `ArtifactCoordinatesInheritGenericArtifactCoordinates` edge,
//! - an `ArtifactHasArtifactCoordinates` edge from the artifact to the
//!   concrete coordinates,
//! - rows in the path index and the generic id index.
//!
//! Each public mutation is a single graph transaction, so none of these
//! pieces is ever observable without the others.

use crate::coordinates::{ArtifactCoordinates, GenericArtifactCoordinates};
use crate::error::{DepotError, Result};
use crate::graph::{GraphSession, GraphView, GraphWrite};
use crate::types::{Artifact, ArtifactArchiveListing, ArtifactKind, EdgeLabel, VertexLabel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

/// Payload of an `Artifact` vertex. Coordinates live in their own vertices.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactRecord {
    storage_id: String,
    repository_id: String,
    coordinates_label: VertexLabel,
    checksums: BTreeMap<String, String>,
    archive_listing: ArtifactArchiveListing,
    size_in_bytes: Option<u64>,
    created: i64,
    last_updated: i64,
}

/// Payload of a `RemoteArtifact` vertex.
#[derive(Debug, Serialize, Deserialize)]
struct RemoteArtifactRecord {
    is_cached: bool,
}

/// Stores and queries artifacts.
#[derive(Clone)]
pub struct ArtifactRepository {
    graph: Arc<GraphSession>,
}

impl ArtifactRepository {
    /// Creates a repository over an open graph session.
    pub fn new(graph: Arc<GraphSession>) -> Self {
        Self { graph }
    }

    /// Persists an artifact and returns it with its uuid assigned.
    ///
    /// An unsaved artifact whose path is already indexed takes over the
    /// existing record, keeping one live artifact per path.
    pub fn save(&self, artifact: &Artifact) -> Result<Artifact> {
        let mut saved = artifact.clone();
        let id = saved.coordinates.id();
        let coordinates_key = coordinates_key(&saved.storage_id, &saved.repository_id, &id);
        let now = unix_now();

        let mut tx = self.graph.write()?;
        let indexed = tx.lookup_path(&saved.storage_id, &saved.repository_id, &id)?;
        let uuid = match (saved.uuid, indexed.as_deref()) {
            (Some(uuid), Some(other)) if other != uuid.to_string() => {
                debug!(path = %id, replaced = %other, "Replacing artifact indexed at path");
                remove_artifact(&mut tx, other)?;
                uuid
            }
            (Some(uuid), _) => uuid,
            (None, Some(existing)) => parse_uuid(existing)?,
            (None, None) => Uuid::new_v4(),
        };
        let key = uuid.to_string();

        let previous = read_record(&tx, &key)?;
        if let Some(previous) = &previous {
            for old_key in tx.out_keys(EdgeLabel::ArtifactHasArtifactCoordinates, &key)? {
                if old_key != coordinates_key || previous.coordinates_label != saved.coordinates.label() {
                    tx.remove_edge(EdgeLabel::ArtifactHasArtifactCoordinates, &key, &old_key)?;
                    remove_coordinates(&mut tx, &key, previous, &old_key)?;
                }
            }
        }

        saved.uuid = Some(uuid);
        saved.created = previous.as_ref().map(|p| p.created).unwrap_or(now);
        saved.last_updated = now;

        let record = ArtifactRecord {
            storage_id: saved.storage_id.clone(),
            repository_id: saved.repository_id.clone(),
            coordinates_label: saved.coordinates.label(),
            checksums: saved.checksums.clone(),
            archive_listing: saved.archive_listing.clone(),
            size_in_bytes: saved.size_in_bytes,
            created: saved.created,
            last_updated: saved.last_updated,
        };
        tx.put_vertex(VertexLabel::Artifact, &key, &encode(&record)?)?;

        match saved.kind {
            ArtifactKind::Remote { is_cached } => {
                let remote = RemoteArtifactRecord { is_cached };
                tx.put_vertex(VertexLabel::RemoteArtifact, &key, &encode(&remote)?)?;
                tx.add_edge(EdgeLabel::RemoteArtifactInheritArtifact, &key, &key)?;
            }
            ArtifactKind::Local => {
                tx.remove_vertex(VertexLabel::RemoteArtifact, &key)?;
                tx.remove_edge(EdgeLabel::RemoteArtifactInheritArtifact, &key, &key)?;
            }
        }

        let coordinates = &saved.coordinates;
        tx.put_vertex(coordinates.label(), &coordinates_key, &encode(coordinates)?)?;
        tx.put_vertex(
            VertexLabel::GenericArtifactCoordinates,
            &coordinates_key,
            &encode(&coordinates.to_generic())?,
        )?;
        tx.add_edge(
            EdgeLabel::ArtifactCoordinatesInheritGenericArtifactCoordinates,
            &coordinates_key,
            &coordinates_key,
        )?;
        tx.add_edge(EdgeLabel::ArtifactHasArtifactCoordinates, &key, &coordinates_key)?;
        tx.put_path(&saved.storage_id, &saved.repository_id, &id, &key)?;
        tx.put_generic(&id, &coordinates_key)?;
        tx.commit()?;

        debug!(
            uuid = %key,
            storage = %saved.storage_id,
            repository = %saved.repository_id,
            path = %id,
            remote = saved.is_remote(),
            "Saved artifact"
        );
        Ok(saved)
    }

    /// Loads an artifact by uuid.
    pub fn find_by_id(&self, uuid: Uuid) -> Result<Option<Artifact>> {
        let read = self.graph.read()?;
        load_artifact(&read, &uuid.to_string())
    }

    /// Loads the live artifact at a repository path.
    pub fn find_one_artifact(&self, storage_id: &str, repository_id: &str, path: &str) -> Result<Option<Artifact>> {
        let read = self.graph.read()?;
        match read.lookup_path(storage_id, repository_id, path)? {
            Some(key) => load_artifact(&read, &key),
            None => Ok(None),
        }
    }

    /// True when an artifact is recorded at the path.
    pub fn exists(&self, storage_id: &str, repository_id: &str, path: &str) -> Result<bool> {
        let read = self.graph.read()?;
        Ok(read.lookup_path(storage_id, repository_id, path)?.is_some())
    }

    /// Every artifact of a repository, ordered by path.
    pub fn find_by_repository(&self, storage_id: &str, repository_id: &str) -> Result<Vec<Artifact>> {
        let read = self.graph.read()?;
        let mut artifacts = Vec::new();
        for (_, key) in read.repository_entries(storage_id, repository_id)? {
            if let Some(artifact) = load_artifact(&read, &key)? {
                artifacts.push(artifact);
            }
        }
        Ok(artifacts)
    }

    /// Every artifact whose coordinates id matches, across layouts and repositories.
    pub fn find_by_generic_id(&self, id: &str) -> Result<Vec<Artifact>> {
        let read = self.graph.read()?;
        let mut artifacts = Vec::new();
        for coordinates_key in read.generic_keys(id)? {
            for key in read.in_keys(EdgeLabel::ArtifactHasArtifactCoordinates, &coordinates_key)? {
                if let Some(artifact) = load_artifact(&read, &key)? {
                    artifacts.push(artifact);
                }
            }
        }
        Ok(artifacts)
    }

    /// Deletes an artifact with its coordinates, edges and index rows.
    ///
    /// Returns false when nothing was stored.
    pub fn delete(&self, artifact: &Artifact) -> Result<bool> {
        let mut tx = self.graph.write()?;
        let key = match artifact.uuid {
            Some(uuid) => uuid.to_string(),
            None => {
                match tx.lookup_path(&artifact.storage_id, &artifact.repository_id, &artifact.path())? {
                    Some(key) => key,
                    None => return Ok(false),
                }
            }
        };
        let removed = remove_artifact(&mut tx, &key)?;
        tx.commit()?;
        if removed {
            debug!(uuid = %key, path = %artifact.path(), "Deleted artifact");
        }
        Ok(removed)
    }

    /// Updates the cached flag of the remote artifact at a path.
    ///
    /// Returns false when no remote artifact is recorded there.
    pub fn set_cached(&self, storage_id: &str, repository_id: &str, path: &str, cached: bool) -> Result<bool> {
        let mut tx = self.graph.write()?;
        let Some(key) = tx.lookup_path(storage_id, repository_id, path)? else {
            return Ok(false);
        };
        if !tx.has_vertex(VertexLabel::RemoteArtifact, &key)? {
            return Ok(false);
        }
        let remote = RemoteArtifactRecord { is_cached: cached };
        tx.put_vertex(VertexLabel::RemoteArtifact, &key, &encode(&remote)?)?;
        tx.commit()?;
        debug!(uuid = %key, path, cached, "Updated remote artifact cache flag");
        Ok(true)
    }
}

/// Key shared by the concrete and generic coordinates vertices of a path.
fn coordinates_key(storage_id: &str, repository_id: &str, id: &str) -> String {
    format!("{}:{}:{}", storage_id, repository_id, id)
}

fn read_record(view: &impl GraphView, key: &str) -> Result<Option<ArtifactRecord>> {
    view.vertex(VertexLabel::Artifact, key)?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn load_artifact(view: &impl GraphView, key: &str) -> Result<Option<Artifact>> {
    let Some(record) = read_record(view, key)? else {
        return Ok(None);
    };
    let coordinates_key = view
        .out_keys(EdgeLabel::ArtifactHasArtifactCoordinates, key)?
        .into_iter()
        .next()
        .ok_or_else(|| DepotError::Graph(format!("artifact {} has no coordinates", key)))?;
    let coordinates: ArtifactCoordinates = view
        .vertex(record.coordinates_label, &coordinates_key)?
        .map(|bytes| decode(&bytes))
        .transpose()?
        .ok_or_else(|| DepotError::Graph(format!("missing coordinates vertex {}", coordinates_key)))?;

    let kind = match view.vertex(VertexLabel::RemoteArtifact, key)? {
        Some(bytes) => {
            let remote: RemoteArtifactRecord = decode(&bytes)?;
            ArtifactKind::Remote {
                is_cached: remote.is_cached,
            }
        }
        None => ArtifactKind::Local,
    };

    Ok(Some(Artifact {
        uuid: Some(parse_uuid(key)?),
        storage_id: record.storage_id,
        repository_id: record.repository_id,
        coordinates,
        checksums: record.checksums,
        archive_listing: record.archive_listing,
        kind,
        size_in_bytes: record.size_in_bytes,
        created: record.created,
        last_updated: record.last_updated,
    }))
}

fn remove_artifact(tx: &mut GraphWrite, key: &str) -> Result<bool> {
    let Some(record) = read_record(&*tx, key)? else {
        return Ok(false);
    };

    if tx.remove_vertex(VertexLabel::RemoteArtifact, key)? {
        tx.remove_edge(EdgeLabel::RemoteArtifactInheritArtifact, key, key)?;
    }
    for coordinates_key in tx.out_keys(EdgeLabel::ArtifactHasArtifactCoordinates, key)? {
        tx.remove_edge(EdgeLabel::ArtifactHasArtifactCoordinates, key, &coordinates_key)?;
        remove_coordinates(tx, key, &record, &coordinates_key)?;
    }
    tx.remove_vertex(VertexLabel::Artifact, key)?;
    Ok(true)
}

/// Removes both coordinates vertices, their edge, and the index rows owned by `artifact_key`.
fn remove_coordinates(
    tx: &mut GraphWrite,
    artifact_key: &str,
    record: &ArtifactRecord,
    coordinates_key: &str,
) -> Result<()> {
    let generic: Option<GenericArtifactCoordinates> = tx
        .vertex(VertexLabel::GenericArtifactCoordinates, coordinates_key)?
        .map(|bytes| decode(&bytes))
        .transpose()?;
    if let Some(generic) = generic {
        tx.remove_generic(&generic.id, coordinates_key)?;
        let indexed = tx.lookup_path(&record.storage_id, &record.repository_id, &generic.id)?;
        if indexed.as_deref() == Some(artifact_key) {
            tx.remove_path(&record.storage_id, &record.repository_id, &generic.id)?;
        }
    }

    tx.remove_edge(
        EdgeLabel::ArtifactCoordinatesInheritGenericArtifactCoordinates,
        coordinates_key,
        coordinates_key,
    )?;
    tx.remove_vertex(record.coordinates_label, coordinates_key)?;
    tx.remove_vertex(VertexLabel::GenericArtifactCoordinates, coordinates_key)?;
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| DepotError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| DepotError::Deserialization(e.to_string()))
}

fn parse_uuid(key: &str) -> Result<Uuid> {
    Uuid::parse_str(key).map_err(|e| DepotError::Graph(format!("invalid artifact key {}: {}", key, e)))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
