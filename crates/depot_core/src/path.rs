//! Repository path handles.

use crate::checksum::ChecksumAlgorithm;
use crate::error::{DepotError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory inside a repository basedir holding trashed content.
pub const TRASH_DIR: &str = ".trash";

/// Directory inside a repository basedir holding in-flight downloads.
pub const TEMP_DIR: &str = ".temp";

/// Identifies a `storage / repository / relative path` triple.
///
/// The relative path always uses `/` separators, never starts with one, and
/// never points into the reserved trash or temp directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryPath {
    storage_id: String,
    repository_id: String,
    path: String,
}

impl RepositoryPath {
    /// Builds a validated path handle.
    ///
    /// ```
    /// use depot_core::RepositoryPath;
    ///
    /// let path = RepositoryPath::new("storage0", "releases", "org/foo/1.0/foo-1.0.jar").unwrap();
    /// assert_eq!(path.file_name(), "foo-1.0.jar");
    /// assert!(RepositoryPath::new("storage0", "releases", "../etc/passwd").is_err());
    /// ```
    pub fn new(storage_id: &str, repository_id: &str, path: &str) -> Result<Self> {
        let normalized = path.trim_start_matches('/');
        validate_relative(path, normalized)?;
        Ok(Self {
            storage_id: storage_id.to_string(),
            repository_id: repository_id.to_string(),
            path: normalized.to_string(),
        })
    }

    /// Storage identifier.
    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    /// Repository identifier.
    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    /// Repository-relative path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path of the parent directory, empty at the repository root.
    pub fn parent(&self) -> &str {
        self.path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
    }

    /// A path in the same directory with a different file name.
    pub fn resolve_sibling(&self, file_name: &str) -> Result<Self> {
        let parent = self.parent();
        let sibling = if parent.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", parent, file_name)
        };
        Self::new(&self.storage_id, &self.repository_id, &sibling)
    }

    /// The checksum sidecar of this path for the given algorithm.
    pub fn sidecar(&self, algorithm: ChecksumAlgorithm) -> Result<Self> {
        self.resolve_sibling(&format!("{}{}", self.file_name(), algorithm.extension()))
    }

    /// For a sidecar path, the algorithm and the path it describes.
    pub fn checksum_target(&self) -> Option<(ChecksumAlgorithm, Self)> {
        let (algorithm, target) = ChecksumAlgorithm::from_sidecar(self.file_name())?;
        let target = self.resolve_sibling(target).ok()?;
        Some((algorithm, target))
    }

    /// True when the path names a checksum sidecar.
    pub fn is_checksum(&self) -> bool {
        ChecksumAlgorithm::from_sidecar(self.file_name()).is_some()
    }
}

impl fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:/{}", self.storage_id, self.repository_id, self.path)
    }
}

fn validate_relative(original: &str, normalized: &str) -> Result<()> {
    let reject = |reason: &str| DepotError::InvalidPath {
        path: original.to_string(),
        reason: reason.to_string(),
    };

    if normalized.is_empty() {
        return Err(reject("path is empty"));
    }
    if normalized.contains('\\') {
        return Err(reject("backslash separators are not allowed"));
    }
    for segment in normalized.split('/') {
        match segment {
            "" => return Err(reject("empty path segment")),
            "." | ".." => return Err(reject("relative segments are not allowed")),
            _ => {}
        }
    }
    let first = normalized.split('/').next().unwrap_or_default();
    if first == TRASH_DIR || first == TEMP_DIR {
        return Err(reject("reserved directory"));
    }
    Ok(())
}
