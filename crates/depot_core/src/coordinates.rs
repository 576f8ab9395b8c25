//! Artifact coordinates: the addressable identity of an artifact within a layout.

use crate::types::VertexLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path-addressed coordinates used by the raw layout and as a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArtifactCoordinates {
    /// Repository-relative path.
    pub path: String,
}

/// Maven `groupId:artifactId:version[:classifier]:extension` coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenArtifactCoordinates {
    /// Dotted group id, e.g. `org.apache.commons`.
    pub group_id: String,
    /// Artifact id.
    pub artifact_id: String,
    /// Version string.
    pub version: String,
    /// Optional classifier, e.g. `sources`.
    pub classifier: Option<String>,
    /// File extension without the dot.
    pub extension: String,
}

impl MavenArtifactCoordinates {
    /// Renders the repository-relative path of these coordinates.
    pub fn to_path(&self) -> String {
        let classifier = self
            .classifier
            .as_deref()
            .map(|c| format!("-{}", c))
            .unwrap_or_default();
        format!(
            "{}/{}/{}/{}-{}{}.{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.artifact_id,
            self.version,
            classifier,
            self.extension
        )
    }
}

/// Concrete coordinates of an artifact.
///
/// Every concrete variant is persisted together with a
/// [`GenericArtifactCoordinates`] record carrying the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactCoordinates {
    /// Path-addressed coordinates.
    Raw(RawArtifactCoordinates),
    /// Maven layout coordinates.
    Maven(MavenArtifactCoordinates),
}

impl ArtifactCoordinates {
    /// Raw coordinates for a path.
    pub fn raw(path: impl Into<String>) -> Self {
        Self::Raw(RawArtifactCoordinates { path: path.into() })
    }

    /// The derived unique identifier: the repository-relative path.
    pub fn id(&self) -> String {
        match self {
            Self::Raw(raw) => raw.path.clone(),
            Self::Maven(maven) => maven.to_path(),
        }
    }

    /// Version, when the layout has one.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Raw(_) => None,
            Self::Maven(maven) => Some(&maven.version),
        }
    }

    /// Axis name to value.
    pub fn coordinates(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        match self {
            Self::Raw(raw) => {
                map.insert("path".to_string(), raw.path.clone());
            }
            Self::Maven(maven) => {
                map.insert("groupId".to_string(), maven.group_id.clone());
                map.insert("artifactId".to_string(), maven.artifact_id.clone());
                map.insert("version".to_string(), maven.version.clone());
                if let Some(classifier) = &maven.classifier {
                    map.insert("classifier".to_string(), classifier.clone());
                }
                map.insert("extension".to_string(), maven.extension.clone());
            }
        }
        map
    }

    /// Graph label of the concrete vertex.
    pub fn label(&self) -> VertexLabel {
        match self {
            Self::Raw(_) => VertexLabel::RawArtifactCoordinates,
            Self::Maven(_) => VertexLabel::MavenArtifactCoordinates,
        }
    }

    /// The generic record this variant inherits.
    pub fn to_generic(&self) -> GenericArtifactCoordinates {
        GenericArtifactCoordinates {
            id: self.id(),
            version: self.version().map(str::to_string),
            coordinates: self.coordinates(),
        }
    }
}

/// Layout-independent view of any coordinates, shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericArtifactCoordinates {
    /// Derived identifier.
    pub id: String,
    /// Optional version.
    pub version: Option<String>,
    /// Axis name to value.
    pub coordinates: BTreeMap<String, String>,
}
