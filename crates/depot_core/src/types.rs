//! Core data types: graph schema labels and the artifact entity.

use crate::checksum::parse_checksum_declaration;
use crate::coordinates::ArtifactCoordinates;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Type of vertex in the artifact graph.
#[repr(u8)]
#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexLabel {
    // Artifacts (1-9)
    /// Stored artifact.
    Artifact = 1,
    /// Proxied artifact, inherits an `Artifact` vertex with the same key.
    RemoteArtifact = 2,

    // Coordinates (10-19)
    /// Layout-independent coordinates every concrete variant inherits.
    GenericArtifactCoordinates = 10,
    /// Path-addressed coordinates.
    RawArtifactCoordinates = 11,
    /// Maven coordinates.
    MavenArtifactCoordinates = 12,
}

impl fmt::Display for VertexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type of edge relationship in the artifact graph.
#[repr(u8)]
#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeLabel {
    /// `Artifact` -> concrete coordinates (1:1).
    ArtifactHasArtifactCoordinates = 1,
    /// Concrete coordinates -> `GenericArtifactCoordinates`.
    ArtifactCoordinatesInheritGenericArtifactCoordinates = 2,
    /// `RemoteArtifact` -> `Artifact`.
    RemoteArtifactInheritArtifact = 3,
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Names of the files contained in an artifact that is itself an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactArchiveListing {
    /// Contained file names.
    pub filenames: BTreeSet<String>,
}

/// Variant of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Deployed into a hosted repository.
    Local,
    /// Proxied from a remote origin.
    Remote {
        /// A local copy currently exists.
        is_cached: bool,
    },
}

/// An artifact and its derived metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Assigned on first save.
    pub uuid: Option<Uuid>,
    /// Storage identifier.
    pub storage_id: String,
    /// Repository identifier.
    pub repository_id: String,
    /// Owned coordinates.
    pub coordinates: ArtifactCoordinates,
    /// Algorithm name to digest.
    pub checksums: BTreeMap<String, String>,
    /// Archive contents.
    pub archive_listing: ArtifactArchiveListing,
    /// Local or remote.
    pub kind: ArtifactKind,
    /// Content size when known.
    pub size_in_bytes: Option<u64>,
    /// Unix seconds of the first save.
    pub created: i64,
    /// Unix seconds of the latest save.
    pub last_updated: i64,
}

impl Artifact {
    /// A new, unsaved local artifact.
    pub fn new(storage_id: &str, repository_id: &str, coordinates: ArtifactCoordinates) -> Self {
        Self {
            uuid: None,
            storage_id: storage_id.to_string(),
            repository_id: repository_id.to_string(),
            coordinates,
            checksums: BTreeMap::new(),
            archive_listing: ArtifactArchiveListing::default(),
            kind: ArtifactKind::Local,
            size_in_bytes: None,
            created: 0,
            last_updated: 0,
        }
    }

    /// A new, unsaved remote artifact.
    pub fn remote(
        storage_id: &str,
        repository_id: &str,
        coordinates: ArtifactCoordinates,
        is_cached: bool,
    ) -> Self {
        Self {
            kind: ArtifactKind::Remote { is_cached },
            ..Self::new(storage_id, repository_id, coordinates)
        }
    }

    /// True for the remote variant.
    pub fn is_remote(&self) -> bool {
        matches!(self.kind, ArtifactKind::Remote { .. })
    }

    /// `Some(is_cached)` for remote artifacts.
    pub fn is_cached(&self) -> Option<bool> {
        match self.kind {
            ArtifactKind::Remote { is_cached } => Some(is_cached),
            ArtifactKind::Local => None,
        }
    }

    /// Sets the cached flag; no effect on local artifacts.
    pub fn set_cached(&mut self, cached: bool) {
        if let ArtifactKind::Remote { is_cached } = &mut self.kind {
            *is_cached = cached;
        }
    }

    /// Path of the artifact inside its repository.
    pub fn path(&self) -> String {
        self.coordinates.id()
    }

    /// Adds `{algorithm}digest` declarations.
    ///
    /// All declarations are parsed before any is applied; a malformed one
    /// rejects the whole batch.
    ///
    /// ```
    /// use depot_core::{Artifact, ArtifactCoordinates};
    ///
    /// let mut artifact = Artifact::new("storage0", "releases", ArtifactCoordinates::raw("a/b.jar"));
    /// artifact.add_checksums(["{md5}3111519d5b4efd31565831f735ab0d2f"]).unwrap();
    /// assert_eq!(artifact.checksums["md5"], "3111519d5b4efd31565831f735ab0d2f");
    /// assert!(artifact.add_checksums(["md5:abc"]).is_err());
    /// ```
    pub fn add_checksums<I, S>(&mut self, declarations: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = declarations
            .into_iter()
            .map(|d| parse_checksum_declaration(d.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.checksums.extend(parsed);
        Ok(())
    }
}
