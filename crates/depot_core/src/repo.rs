//! Depot handle wiring storage, graph, fetch, freshness and trash together.

use crate::api::TrashApi;
use crate::artifact_repository::ArtifactRepository;
use crate::checksum::ContentDigests;
use crate::checksum_cache::{ChecksumCache, ChecksumCacheManager};
use crate::config::{Config, RepositoryConfig, CONFIG_FILE};
use crate::error::{DepotError, Result};
use crate::expiration::{ExpirationDispatcher, ExpirationReport, MetadataExpiredPathHandler};
use crate::fetch::{store_stream, FetchContext, PathLocks, ProxyFetchExecutor, RetryPolicy};
use crate::graph::GraphSession;
use crate::path::RepositoryPath;
use crate::provider::{ProviderRegistry, RepositoryType};
use crate::remote::{HttpRemoteClient, RemoteClient};
use crate::storage::StorageRegistry;
use crate::trash::{PathState, TrashManager};
use crate::types::Artifact;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Directory of the graph database inside the depot root.
const GRAPH_DIR: &str = "graph";
/// Graph database file name.
const GRAPH_FILE: &str = "graph.redb";

/// State that outlives a rewiring.
struct Shared {
    checksums: Arc<ChecksumCacheManager>,
    locks: Arc<PathLocks>,
}

/// Components built from one configuration.
struct Components {
    storages: Arc<StorageRegistry>,
    checksums: Arc<ChecksumCacheManager>,
    locks: Arc<PathLocks>,
    fetcher: Arc<ProxyFetchExecutor>,
    trash: Arc<TrashManager>,
    expiration: ExpirationDispatcher,
}

/// Depot handle.
///
/// Provides the main API for interacting with a depot root.
pub struct DepotRepo {
    /// Root directory holding `depot.toml`, the graph and default storages.
    root: PathBuf,
    config: Config,
    graph: Arc<GraphSession>,
    remote: Arc<dyn RemoteClient>,
    providers: Arc<ProviderRegistry>,
    artifacts: ArtifactRepository,
    components: Components,
}

impl DepotRepo {
    /// Initializes a new depot with an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `depot.toml` already exists or directory creation fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use depot_core::DepotRepo;
    ///
    /// let repo = DepotRepo::init("/srv/depot").unwrap();
    /// ```
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if root.join(CONFIG_FILE).exists() {
            return Err(DepotError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("depot already exists in {}", root.display()),
            )));
        }

        fs::create_dir_all(root.join(GRAPH_DIR))?;
        fs::create_dir_all(root.join("storages"))?;
        Config::default().save(&root)?;
        info!(root = %root.display(), "Initialized depot");
        Self::open(root)
    }

    /// Opens an existing depot, fetching over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the root holds no `depot.toml` or it is invalid.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();
        let config = load_existing(root)?;
        let remote = Arc::new(HttpRemoteClient::new(config.fetch.timeout())?);
        Self::open_with_remote(root, remote)
    }

    /// Opens an existing depot with a custom remote client.
    pub fn open_with_remote(path: impl AsRef<Path>, remote: Arc<dyn RemoteClient>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let config = load_existing(&root)?;
        let graph = Arc::new(GraphSession::open(root.join(GRAPH_DIR).join(GRAPH_FILE))?);
        let providers = Arc::new(ProviderRegistry::with_defaults());
        let artifacts = ArtifactRepository::new(graph.clone());
        let shared = Shared {
            checksums: Arc::new(ChecksumCacheManager::new(config.checksum_cache.lifetime())),
            locks: Arc::new(PathLocks::new()),
        };
        let components = wire(&root, &config, &remote, &providers, &artifacts, shared);
        debug!(root = %root.display(), storages = config.storages.len(), "Opened depot");

        Ok(Self {
            root,
            config,
            graph,
            remote,
            providers,
            artifacts,
            components,
        })
    }

    /// Returns the depot root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the graph database.
    pub fn graph_path(&self) -> &Path {
        self.graph.path()
    }

    /// Resolved storages.
    pub fn storages(&self) -> &StorageRegistry {
        &self.components.storages
    }

    /// Artifact persistence.
    pub fn artifacts(&self) -> &ArtifactRepository {
        &self.artifacts
    }

    /// Last-observed checksums.
    pub fn checksums(&self) -> &ChecksumCacheManager {
        &self.components.checksums
    }

    /// Trash lifecycle operations.
    pub fn trash(&self) -> &TrashManager {
        &self.components.trash
    }

    /// The trash endpoint contract over this depot.
    pub fn trash_api(&self) -> TrashApi {
        TrashApi::new(self.components.trash.clone())
    }

    /// Adds a repository and persists the configuration.
    ///
    /// Cached checksums and path locks carry over to the rewired components.
    pub fn add_repository(&mut self, storage_id: &str, repository: RepositoryConfig) -> Result<()> {
        let mut config = self.config.clone();
        config.add_repository(storage_id, repository)?;
        config.save(&self.root)?;
        let shared = Shared {
            checksums: self.components.checksums.clone(),
            locks: self.components.locks.clone(),
        };
        self.components = wire(
            &self.root,
            &config,
            &self.remote,
            &self.providers,
            &self.artifacts,
            shared,
        );
        self.config = config;
        Ok(())
    }

    /// Builds a validated path handle.
    pub fn path(&self, storage_id: &str, repository_id: &str, path: &str) -> Result<RepositoryPath> {
        let repository = self.components.storages.get_repository(storage_id, repository_id)?;
        repository.path(path)
    }

    /// Stores content into a hosted repository.
    ///
    /// Returns the recorded artifact, or `None` for files the layout does
    /// not treat as artifacts (checksum sidecars, metadata descriptors).
    pub fn deploy(&self, path: &RepositoryPath, content: &mut dyn Read) -> Result<Option<Artifact>> {
        let repository = self.components.storages.repository_for(path)?;
        if repository.repository_type() != RepositoryType::Hosted {
            return Err(DepotError::Unsupported(format!(
                "cannot deploy into {} repository {}:{}",
                repository.repository_type(),
                repository.storage_id(),
                repository.id()
            )));
        }

        let buffer_size = self.config.fetch.buffer_size;
        let stored = self.components.locks.with_lock(path, || {
            store_stream(
                &repository,
                path,
                content,
                None,
                buffer_size,
                &FetchContext::unbounded(),
                DepotError::Io,
            )
        })?;
        info!(path = %path, bytes = stored.size, "Deployed");

        let digests = stored.digests.finish();
        for (algorithm, digest) in &digests {
            self.components.checksums.put(path, *algorithm, digest);
        }
        let Some(coordinates) = repository.layout().coordinates_for(path.path()) else {
            return Ok(None);
        };
        let mut artifact = self
            .artifacts
            .find_one_artifact(path.storage_id(), path.repository_id(), path.path())?
            .unwrap_or_else(|| Artifact::new(path.storage_id(), path.repository_id(), coordinates));
        artifact.size_in_bytes = Some(stored.size);
        for (algorithm, digest) in digests {
            artifact.checksums.insert(algorithm.name().to_string(), digest);
        }
        self.artifacts.save(&artifact).map(Some)
    }

    /// Serves a path, fetching proxy content on a miss (or always with `force`).
    ///
    /// Transport failures are retried per the `[fetch]` configuration.
    pub fn resolve(&self, path: &RepositoryPath, force: bool) -> Result<PathBuf> {
        let fetch = &self.config.fetch;
        let retry = RetryPolicy::new(fetch.retry_attempts, fetch.retry_backoff());
        retry.run(|attempt| {
            let ctx = FetchContext::with_timeout(fetch.timeout());
            debug!(path = %path, attempt, force, "Resolving");
            if force {
                self.components.fetcher.fetch(path, &ctx)
            } else {
                self.components.fetcher.resolve_path(path, &ctx)
            }
        })
    }

    /// Runs the expiry handlers for a path.
    pub fn expire(&self, path: &RepositoryPath) -> ExpirationReport {
        self.components.expiration.handle(path)
    }

    /// Seeds missing checksum cache entries from the local copy of a path.
    ///
    /// A freshly opened depot has observed no fetches; the local copy is
    /// what the last fetch stored. Returns false when there is no local copy.
    pub fn prime_checksums(&self, path: &RepositoryPath) -> Result<bool> {
        let repository = self.components.storages.repository_for(path)?;
        let local = repository.content_path(path);
        let buffer_size = self.config.fetch.buffer_size.max(1);

        let digests = self.components.locks.with_lock(path, || -> Result<_> {
            let mut file = match fs::File::open(&local) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let mut digests = ContentDigests::new();
            let mut buf = vec![0u8; buffer_size];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                digests.update(&buf[..n]);
            }
            Ok(Some(digests.finish()))
        })?;

        let Some(digests) = digests else {
            return Ok(false);
        };
        for (algorithm, digest) in digests {
            if self.components.checksums.get(path, algorithm).is_none() {
                debug!(path = %path, %algorithm, "Primed checksum from local copy");
                self.components.checksums.put(path, algorithm, &digest);
            }
        }
        Ok(true)
    }

    /// The artifact recorded at a path.
    pub fn show(&self, path: &RepositoryPath) -> Result<Option<Artifact>> {
        self.artifacts
            .find_one_artifact(path.storage_id(), path.repository_id(), path.path())
    }

    /// Deletes a path, into the trash unless forced or disabled.
    pub fn delete(&self, path: &RepositoryPath, force: bool) -> Result<()> {
        self.components.trash.delete(path, force)
    }

    /// Where the content of a path lives.
    pub fn state(&self, path: &RepositoryPath) -> Result<PathState> {
        self.components.trash.state(path)
    }
}

fn load_existing(root: &Path) -> Result<Config> {
    if !root.join(CONFIG_FILE).exists() {
        return Err(DepotError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Not a depot: {}", root.display()),
        )));
    }
    Config::load(root)
}

fn wire(
    root: &Path,
    config: &Config,
    remote: &Arc<dyn RemoteClient>,
    providers: &Arc<ProviderRegistry>,
    artifacts: &ArtifactRepository,
    shared: Shared,
) -> Components {
    let Shared { checksums, locks } = shared;
    let storages = Arc::new(StorageRegistry::from_config(root, config));
    let fetcher = Arc::new(ProxyFetchExecutor::new(
        storages.clone(),
        remote.clone(),
        checksums.clone(),
        artifacts.clone(),
        locks.clone(),
        config.fetch.buffer_size,
    ));
    let trash = Arc::new(TrashManager::new(
        storages.clone(),
        artifacts.clone(),
        checksums.clone(),
        locks.clone(),
    ));

    let mut expiration = ExpirationDispatcher::new(storages.clone());
    expiration.register(Arc::new(MetadataExpiredPathHandler::new(
        storages.clone(),
        providers.clone(),
        checksums.clone(),
        fetcher.clone(),
    )));

    Components {
        storages,
        checksums,
        locks,
        fetcher,
        trash,
        expiration,
    }
}
