//! Repository layouts: how paths map onto artifact coordinates.

use crate::checksum::ChecksumAlgorithm;
use crate::coordinates::{ArtifactCoordinates, MavenArtifactCoordinates};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maven repository metadata descriptor file name.
pub const MAVEN_METADATA_XML: &str = "maven-metadata.xml";

/// Content layout of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RepositoryLayout {
    /// Maven 2 directory layout.
    #[serde(rename = "maven2")]
    Maven2,
    /// Arbitrary path-addressed files.
    #[default]
    #[serde(rename = "raw")]
    Raw,
}

impl RepositoryLayout {
    /// Derives coordinates for a repository-relative path.
    ///
    /// Returns `None` for files that are not artifacts in this layout:
    /// checksum sidecars, metadata descriptors, or paths that do not follow
    /// the layout's naming rules.
    ///
    /// ```
    /// use depot_core::{ArtifactCoordinates, RepositoryLayout};
    ///
    /// let coordinates = RepositoryLayout::Raw.coordinates_for("a/b/c.jar").unwrap();
    /// assert_eq!(coordinates, ArtifactCoordinates::raw("a/b/c.jar"));
    /// assert!(RepositoryLayout::Raw.coordinates_for("a/b/c.jar.sha1").is_none());
    /// ```
    pub fn coordinates_for(&self, path: &str) -> Option<ArtifactCoordinates> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if ChecksumAlgorithm::from_sidecar(file_name).is_some() {
            return None;
        }
        match self {
            Self::Raw => Some(ArtifactCoordinates::raw(path)),
            Self::Maven2 => {
                if file_name == MAVEN_METADATA_XML {
                    return None;
                }
                parse_maven_path(path).map(ArtifactCoordinates::Maven)
            }
        }
    }

    /// True when the file name is a metadata descriptor of this layout.
    pub fn is_descriptor(&self, file_name: &str) -> bool {
        match self {
            Self::Maven2 => file_name == MAVEN_METADATA_XML,
            Self::Raw => false,
        }
    }
}

impl fmt::Display for RepositoryLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maven2 => f.write_str("maven2"),
            Self::Raw => f.write_str("raw"),
        }
    }
}

/// Parses `group/dirs/artifact/version/artifact-version[-classifier].ext`.
fn parse_maven_path(path: &str) -> Option<MavenArtifactCoordinates> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 4 {
        return None;
    }
    let n = segments.len();
    let file_name = segments[n - 1];
    let version = segments[n - 2];
    let artifact_id = segments[n - 3];
    let group_id = segments[..n - 3].join(".");

    let rest = file_name.strip_prefix(&format!("{}-{}", artifact_id, version))?;
    let (classifier, extension) = if let Some(extension) = rest.strip_prefix('.') {
        (None, extension)
    } else {
        let (classifier, extension) = rest.strip_prefix('-')?.split_once('.')?;
        if classifier.is_empty() {
            return None;
        }
        (Some(classifier.to_string()), extension)
    };
    if extension.is_empty() {
        return None;
    }

    Some(MavenArtifactCoordinates {
        group_id,
        artifact_id: artifact_id.to_string(),
        version: version.to_string(),
        classifier,
        extension: extension.to_string(),
    })
}
