//! Error types for depot_core operations.

use thiserror::Error;

/// Core error type for depot_core operations.
#[derive(Error, Debug)]
pub enum DepotError {
    /// The named storage is not configured.
    #[error("storage not found: {0}")]
    StorageNotFound(String),

    /// The named repository is not configured in the storage.
    #[error("repository not found: {storage_id}:{repository_id}")]
    RepositoryNotFound {
        /// Storage the lookup was made in
        storage_id: String,
        /// Repository that was requested
        repository_id: String,
    },

    /// No artifact (local copy, remote entry or graph record) exists for the path.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// The trash area holds no copy of the path.
    #[error("trashed path not found: {0}")]
    TrashedPathNotFound(String),

    /// A repository path failed validation.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// A checksum declaration is not of the form `{algorithm}digest`.
    #[error("invalid checksum declaration: {0:?}")]
    InvalidChecksum(String),

    /// Moving, restoring or removing artifact content failed.
    #[error("artifact storage error: {0}")]
    ArtifactStorage(String),

    /// The remote transfer failed, before or after bytes were delivered.
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// The operation does not apply to this kind of repository.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The graph store rejected an operation.
    #[error("graph error: {0}")]
    Graph(String),

    /// Serialization error while encoding a vertex.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while decoding a vertex.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error during local file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used when mapping errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Referenced storage, repository, artifact or trashed path does not exist.
    NotFound,
    /// The request could not be carried out against local storage.
    BadRequest,
    /// The remote transfer failed.
    Transport,
    /// Anything else.
    Internal,
}

impl DepotError {
    /// Returns the response class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::StorageNotFound(_)
            | Self::RepositoryNotFound { .. }
            | Self::ArtifactNotFound(_)
            | Self::TrashedPathNotFound(_) => ErrorClass::NotFound,
            Self::InvalidPath { .. }
            | Self::InvalidChecksum(_)
            | Self::ArtifactStorage(_)
            | Self::Unsupported(_) => ErrorClass::BadRequest,
            Self::Transport(_) => ErrorClass::Transport,
            _ => ErrorClass::Internal,
        }
    }

    /// True for the not-found class.
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::StorageNotFound(_) | Self::RepositoryNotFound { .. } => {
                Some("Check the storages section of depot.toml, or add the repository with 'depot repo add'.")
            }
            Self::Transport(_) => {
                Some("The remote transfer failed. Retry the request once the remote is reachable.")
            }
            Self::Graph(_) => Some("The graph database may be corrupted or locked by another process."),
            Self::TrashedPathNotFound(_) => Some("Only paths that were trashed can be restored."),
            _ => None,
        }
    }

    /// Wraps an I/O failure of a content move as an [`DepotError::ArtifactStorage`].
    pub(crate) fn storage(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::ArtifactStorage(format!("{}: {}", context, err))
    }
}

/// Maps any displayable graph-engine error into [`DepotError::Graph`].
pub(crate) fn graph_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> DepotError {
    move |e| DepotError::Graph(format!("{}: {}", context, e))
}

/// Convenience Result type for depot_core operations.
pub type Result<T> = std::result::Result<T, DepotError>;
