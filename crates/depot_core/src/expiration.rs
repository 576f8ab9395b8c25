//! Freshness of expired proxy metadata.
//!
//! When a cached `maven-metadata.xml` in a proxy repository expires, the
//! checksum observed on the previous fetch is compared with the one the
//! remote advertises now. SHA-1 is consulted first; MD5 only when SHA-1
//! cannot decide. Matching checksums keep the cached copy; anything else
//! force-fetches the descriptor.

use crate::checksum::ChecksumAlgorithm;
use crate::checksum_cache::ChecksumCache;
use crate::error::{DepotError, Result};
use crate::fetch::{ForceFetch, PathLocks};
use crate::layout::RepositoryLayout;
use crate::path::RepositoryPath;
use crate::provider::ProviderRegistry;
use crate::storage::StorageRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of a freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The checksums could not be compared.
    Unknown,
    /// The remote changed; re-fetch.
    Fetch,
    /// The cached copy is current.
    Keep,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Fetch => "fetch",
            Self::Keep => "keep",
        };
        f.write_str(name)
    }
}

/// Reacts to the expiry of a cached path.
pub trait ExpiredPathHandler: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Layout of the repositories this handler serves.
    fn layout(&self) -> RepositoryLayout;

    /// True when the handler applies to the path.
    fn supports(&self, path: &RepositoryPath) -> bool;

    /// Handles the expiry, returning the decision that was taken.
    fn handle_expiration(&self, path: &RepositoryPath) -> Result<Decision>;
}

/// Checksum-driven refresh of Maven metadata descriptors in proxy repositories.
pub struct MetadataExpiredPathHandler {
    storages: Arc<StorageRegistry>,
    providers: Arc<ProviderRegistry>,
    checksums: Arc<dyn ChecksumCache>,
    fetcher: Arc<dyn ForceFetch>,
    locks: PathLocks,
}

impl MetadataExpiredPathHandler {
    /// Creates the handler.
    ///
    /// Decisions for one path are serialized on a lock table of their own;
    /// the fetches they trigger take the fetch executor's locks.
    pub fn new(
        storages: Arc<StorageRegistry>,
        providers: Arc<ProviderRegistry>,
        checksums: Arc<dyn ChecksumCache>,
        fetcher: Arc<dyn ForceFetch>,
    ) -> Self {
        Self {
            storages,
            providers,
            checksums,
            fetcher,
            locks: PathLocks::new(),
        }
    }

    /// Compares the cached checksum with the remote one for one algorithm.
    ///
    /// Fetches the sidecar only when a previous checksum is known. The
    /// previous checksum is dropped first, so a sidecar that yields no
    /// checksum leaves the algorithm undecided.
    pub fn evaluate(&self, path: &RepositoryPath, algorithm: ChecksumAlgorithm) -> Result<Decision> {
        let Some(current) = self.checksums.get(path, algorithm) else {
            return Ok(Decision::Unknown);
        };
        self.checksums.remove_digest(path, algorithm);

        match self.fetcher.resolve_path_force_fetch(&path.sidecar(algorithm)?) {
            Ok(_) => {}
            Err(DepotError::ArtifactNotFound(_)) => {
                debug!(path = %path, %algorithm, "Remote has no checksum sidecar");
                return Ok(Decision::Unknown);
            }
            Err(e) => return Err(e),
        }

        let Some(remote) = self.checksums.get(path, algorithm) else {
            return Ok(Decision::Unknown);
        };
        Ok(if current == remote {
            Decision::Keep
        } else {
            Decision::Fetch
        })
    }

    /// SHA-1 first; MD5 only when SHA-1 is undecided.
    pub fn decide(&self, path: &RepositoryPath) -> Result<Decision> {
        for algorithm in ChecksumAlgorithm::FRESHNESS_ORDER {
            let decision = self.evaluate(path, algorithm)?;
            if decision != Decision::Unknown {
                return Ok(decision);
            }
        }
        Ok(Decision::Unknown)
    }
}

impl ExpiredPathHandler for MetadataExpiredPathHandler {
    fn name(&self) -> &'static str {
        "maven-metadata"
    }

    fn layout(&self) -> RepositoryLayout {
        RepositoryLayout::Maven2
    }

    fn supports(&self, path: &RepositoryPath) -> bool {
        if !self.layout().is_descriptor(path.file_name()) {
            return false;
        }
        let Ok(repository) = self.storages.repository_for(path) else {
            return false;
        };
        self.providers
            .get_provider(repository.repository_type())
            .map(|provider| provider.is_caching())
            .unwrap_or(false)
    }

    fn handle_expiration(&self, path: &RepositoryPath) -> Result<Decision> {
        self.locks.with_lock(path, || {
            let decision = self.decide(path)?;
            match decision {
                Decision::Keep => {
                    debug!(path = %path, "Local and remote checksums match, keeping metadata");
                    return Ok(decision);
                }
                Decision::Unknown => {
                    debug!(path = %path, "Checksum comparison inconclusive, re-fetching metadata")
                }
                Decision::Fetch => debug!(path = %path, "Checksums differ, re-fetching metadata"),
            }
            self.fetcher.resolve_path_force_fetch(path)?;
            Ok(decision)
        })
    }
}

/// What one handler did with an event.
#[derive(Debug)]
pub struct HandlerOutcome {
    /// Handler name.
    pub handler: &'static str,
    /// Decision taken, or the error message of a failed handler.
    pub result: std::result::Result<Decision, String>,
}

/// Outcomes of every handler selected for an expired path.
#[derive(Debug)]
pub struct ExpirationReport {
    /// The expired path.
    pub path: RepositoryPath,
    /// One entry per selected handler, in registration order.
    pub outcomes: Vec<HandlerOutcome>,
}

impl ExpirationReport {
    /// True when no handler failed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Routes expiry events to the handlers of the path's layout.
pub struct ExpirationDispatcher {
    storages: Arc<StorageRegistry>,
    handlers: Vec<Arc<dyn ExpiredPathHandler>>,
}

impl ExpirationDispatcher {
    /// A dispatcher without handlers.
    pub fn new(storages: Arc<StorageRegistry>) -> Self {
        Self {
            storages,
            handlers: Vec::new(),
        }
    }

    /// Appends a handler.
    pub fn register(&mut self, handler: Arc<dyn ExpiredPathHandler>) {
        self.handlers.push(handler);
    }

    /// Runs every matching handler.
    ///
    /// A failing handler is logged and recorded; it never stops the others.
    pub fn handle(&self, path: &RepositoryPath) -> ExpirationReport {
        let mut report = ExpirationReport {
            path: path.clone(),
            outcomes: Vec::new(),
        };
        let layout = match self.storages.repository_for(path) {
            Ok(repository) => repository.layout(),
            Err(e) => {
                warn!(path = %path, error = %e, "Ignoring expiry of unknown repository path");
                return report;
            }
        };

        for handler in &self.handlers {
            if handler.layout() != layout || !handler.supports(path) {
                continue;
            }
            let result = handler.handle_expiration(path).map_err(|e| {
                error!(path = %path, handler = handler.name(), error = %e, "Expired path improperly handled");
                e.to_string()
            });
            report.outcomes.push(HandlerOutcome {
                handler: handler.name(),
                result,
            });
        }
        report
    }
}
