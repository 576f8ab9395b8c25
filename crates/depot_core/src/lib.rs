//! Depot Core Library
//!
//! An artifact repository manager, providing:
//! - Storages of hosted and proxy repositories on the local filesystem
//! - An artifact graph persisted in redb
//! - Proxy fetching with checksum tracking
//! - Metadata freshness checks against remote checksums
//! - A per-repository trash lifecycle
//!
//! # Quick Start
//!
//! ```
//! use depot_core::{DepotRepo, MemoryRemote, RepositoryConfig, RepositoryLayout};
//! use std::sync::Arc;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! DepotRepo::init(tmp.path()).unwrap();
//!
//! let remote = Arc::new(MemoryRemote::new());
//! remote.serve("org/foo/bar/1.0/bar-1.0.jar", b"jar bytes".to_vec());
//!
//! let mut depot = DepotRepo::open_with_remote(tmp.path(), remote.clone()).unwrap();
//! depot
//!     .add_repository(
//!         "storage0",
//!         RepositoryConfig::proxy("central", RepositoryLayout::Maven2, "https://repo.example/maven2"),
//!     )
//!     .unwrap();
//!
//! // The first resolve fetches, the second is served from the cache
//! let path = depot.path("storage0", "central", "org/foo/bar/1.0/bar-1.0.jar").unwrap();
//! depot.resolve(&path, false).unwrap();
//! depot.resolve(&path, false).unwrap();
//! assert_eq!(remote.request_count("org/foo/bar/1.0/bar-1.0.jar"), 1);
//! ```
//!
//! # Features
//!
//! ## Trash
//!
//! Deleting from a repository with trash enabled moves the file aside
//! instead of removing it:
//!
//! ```
//! use depot_core::{DepotRepo, PathState, RepositoryConfig, RepositoryLayout};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let mut depot = DepotRepo::init(tmp.path()).unwrap();
//! depot
//!     .add_repository("storage0", RepositoryConfig::hosted("releases", RepositoryLayout::Raw))
//!     .unwrap();
//!
//! let path = depot.path("storage0", "releases", "docs/readme.txt").unwrap();
//! depot.deploy(&path, &mut &b"hello"[..]).unwrap();
//!
//! depot.delete(&path, false).unwrap();
//! assert_eq!(depot.state(&path).unwrap(), PathState::Trashed);
//!
//! depot.trash().undelete("storage0", "releases", "docs/readme.txt").unwrap();
//! assert_eq!(depot.state(&path).unwrap(), PathState::Active);
//! ```

mod api;
mod artifact_repository;
mod checksum;
mod checksum_cache;
mod config;
mod coordinates;
mod error;
mod expiration;
mod fetch;
mod graph;
mod layout;
mod path;
mod provider;
mod remote;
mod repo;
mod storage;
mod trash;
mod types;

pub use api::{ApiResponse, TrashApi, PATH_NOT_FOUND, REPOSITORY_NOT_FOUND, STORAGE_NOT_FOUND};
pub use artifact_repository::ArtifactRepository;
pub use checksum::{
    format_checksum_declarations, parse_checksum_declaration, parse_sidecar, ChecksumAlgorithm,
    ContentDigests,
};
pub use checksum_cache::{ChecksumCache, ChecksumCacheManager};
pub use config::{
    ChecksumCacheConfig, Config, FetchConfig, RepositoryConfig, StorageConfig, CONFIG_FILE,
};
pub use coordinates::{
    ArtifactCoordinates, GenericArtifactCoordinates, MavenArtifactCoordinates,
    RawArtifactCoordinates,
};
pub use error::{DepotError, ErrorClass, Result};
pub use expiration::{
    Decision, ExpirationDispatcher, ExpirationReport, ExpiredPathHandler, HandlerOutcome,
    MetadataExpiredPathHandler,
};
pub use fetch::{FetchContext, ForceFetch, PathLocks, ProxyFetchExecutor, RetryPolicy};
pub use graph::{GraphRead, GraphSession, GraphView, GraphWrite, GRAPH_SCHEMA_VERSION};
pub use layout::{RepositoryLayout, MAVEN_METADATA_XML};
pub use path::{RepositoryPath, TEMP_DIR, TRASH_DIR};
pub use provider::{
    GroupRepositoryProvider, HostedRepositoryProvider, ProviderCapability, ProviderRegistry,
    ProxyRepositoryProvider, RepositoryProvider, RepositoryType,
};
pub use remote::{HttpRemoteClient, MemoryRemote, RemoteBehavior, RemoteClient, RemoteResponse};
pub use repo::DepotRepo;
pub use storage::{Repository, Storage, StorageRegistry};
pub use trash::{PathState, TrashManager};
pub use types::*;
