//! Status and body contract of the trash endpoints.
//!
//! | Endpoint                                    | Operation                       |
//! |---------------------------------------------|---------------------------------|
//! | `DELETE /trash/{storageId}/{repositoryId}`  | [`TrashApi::delete_trash`]      |
//! | `DELETE /trash`                             | [`TrashApi::delete_trash_all`]  |
//! | `POST /trash/{storageId}/{repositoryId}/{path}` | [`TrashApi::undelete`]      |
//! | `POST /trash/{storageId}/{repositoryId}`    | [`TrashApi::undelete_trash`]    |
//! | `POST /trash`                               | [`TrashApi::undelete_trash_all`]|

use crate::error::DepotError;
use crate::trash::TrashManager;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Body of a not-found response for an unknown storage.
pub const STORAGE_NOT_FOUND: &str = "The specified storageId does not exist!";
/// Body of a not-found response for an unknown repository.
pub const REPOSITORY_NOT_FOUND: &str = "The specified repositoryId does not exist!";
/// Body of a not-found response for a path with no trashed copy.
pub const PATH_NOT_FOUND: &str = "The specified path does not exist!";

/// A plain-text response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Plain-text body, empty on success.
    pub body: String,
}

impl ApiResponse {
    /// 200 with an empty body.
    pub fn ok() -> Self {
        Self::with_status(200, "")
    }

    /// Any status with a body.
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trash endpoints over a [`TrashManager`].
pub struct TrashApi {
    trash: Arc<TrashManager>,
}

impl TrashApi {
    /// Creates the endpoint set.
    pub fn new(trash: Arc<TrashManager>) -> Self {
        Self { trash }
    }

    /// `DELETE /trash/{storageId}/{repositoryId}`
    pub fn delete_trash(&self, storage_id: &str, repository_id: &str) -> ApiResponse {
        match self.trash.delete_trash(storage_id, repository_id) {
            Ok(_) => {
                debug!(storage = storage_id, repository = repository_id, "Deleted trash for repository");
                ApiResponse::ok()
            }
            Err(e) => failure(e, 400),
        }
    }

    /// `DELETE /trash`
    pub fn delete_trash_all(&self) -> ApiResponse {
        match self.trash.delete_trash_all() {
            Ok(_) => ApiResponse::ok(),
            Err(e) => {
                error!(error = %e, "Failed to delete trash for all repositories");
                ApiResponse::with_status(500, e.to_string())
            }
        }
    }

    /// `POST /trash/{storageId}/{repositoryId}/{path}`
    pub fn undelete(&self, storage_id: &str, repository_id: &str, path: &str) -> ApiResponse {
        match self.trash.undelete(storage_id, repository_id, path) {
            Ok(()) => {
                debug!(storage = storage_id, repository = repository_id, path, "Undeleted path");
                ApiResponse::ok()
            }
            Err(e) => failure(e, 400),
        }
    }

    /// `POST /trash/{storageId}/{repositoryId}`
    pub fn undelete_trash(&self, storage_id: &str, repository_id: &str) -> ApiResponse {
        match self.trash.undelete_trash(storage_id, repository_id) {
            Ok(_) => ApiResponse::ok(),
            Err(e) => failure(e, 400),
        }
    }

    /// `POST /trash`
    pub fn undelete_trash_all(&self) -> ApiResponse {
        match self.trash.undelete_trash_all() {
            Ok(_) => ApiResponse::ok(),
            Err(e) => {
                error!(error = %e, "Failed to undelete trash for all repositories");
                ApiResponse::with_status(400, e.to_string())
            }
        }
    }
}

/// Not-found errors map to 404 with their fixed body, anything else to `status`.
fn failure(err: DepotError, status: u16) -> ApiResponse {
    match err {
        DepotError::StorageNotFound(_) => ApiResponse::with_status(404, STORAGE_NOT_FOUND),
        DepotError::RepositoryNotFound { .. } => ApiResponse::with_status(404, REPOSITORY_NOT_FOUND),
        DepotError::TrashedPathNotFound(_) => ApiResponse::with_status(404, PATH_NOT_FOUND),
        other => ApiResponse::with_status(status, other.to_string()),
    }
}
