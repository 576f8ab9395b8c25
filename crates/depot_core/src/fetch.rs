//! Proxy fetch executor.
//!
//! Fetches stream from the remote into `<basedir>/.temp` and are renamed
//! into place only after the whole body arrived. A failure at any point,
//! whether before the first byte or after the last-but-one, is reported as
//! the same [`DepotError::Transport`] and leaves any earlier copy untouched.

use crate::artifact_repository::ArtifactRepository;
use crate::checksum::{parse_sidecar, ContentDigests};
use crate::checksum_cache::ChecksumCache;
use crate::error::{DepotError, ErrorClass, Result};
use crate::path::RepositoryPath;
use crate::remote::RemoteClient;
use crate::storage::{Repository, StorageRegistry};
use crate::types::{Artifact, ArtifactKind};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-path mutual exclusion.
///
/// Operations on the same path run one at a time; different paths proceed
/// in parallel. Locks are not reentrant.
#[derive(Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<RepositoryPath, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// An empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `path`.
    pub fn with_lock<T>(&self, path: &RepositoryPath, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(path.clone()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table and this call hold the entry: nobody is waiting on it.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
        result
    }

    /// Number of paths with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no lock entry is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caller-imposed bounds on a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl FetchContext {
    /// No deadline, not cancelled.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Fails the fetch once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::default(),
        }
    }

    /// Fails the fetch once `deadline` is reached.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    /// Cancels every fetch sharing this context (clones included).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> io::Result<()> {
        if self.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "fetch cancelled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "fetch deadline exceeded"));
            }
        }
        Ok(())
    }
}

/// Bounded retry for callers that want it; the executor itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Up to `max_attempts` attempts (at least one), sleeping `backoff * n` after the n-th failure.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op`, retrying transport errors only.
    pub fn run<T>(&self, mut op: impl FnMut(u32) -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Err(e) if e.class() == ErrorClass::Transport && attempt < self.max_attempts => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "Retrying after transport error");
                    std::thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Unconditional remote retrieval, as needed by the freshness engine.
pub trait ForceFetch: Send + Sync {
    /// Fetches `path` from its remote, bypassing any cached copy.
    fn resolve_path_force_fetch(&self, path: &RepositoryPath) -> Result<PathBuf>;
}

/// Removes the temp file unless it was persisted.
struct TempDownload {
    path: PathBuf,
    persisted: bool,
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        if !self.persisted {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove temp download");
                }
            }
        }
    }
}

/// Fetches proxy repository content from remotes.
pub struct ProxyFetchExecutor {
    storages: Arc<StorageRegistry>,
    remote: Arc<dyn RemoteClient>,
    checksums: Arc<dyn ChecksumCache>,
    artifacts: ArtifactRepository,
    locks: Arc<PathLocks>,
    buffer_size: usize,
}

impl ProxyFetchExecutor {
    /// Creates an executor.
    ///
    /// `locks` is shared with the trash manager so that fetches and trash
    /// moves of one path never interleave.
    pub fn new(
        storages: Arc<StorageRegistry>,
        remote: Arc<dyn RemoteClient>,
        checksums: Arc<dyn ChecksumCache>,
        artifacts: ArtifactRepository,
        locks: Arc<PathLocks>,
        buffer_size: usize,
    ) -> Self {
        Self {
            storages,
            remote,
            checksums,
            artifacts,
            locks,
            buffer_size: buffer_size.max(1),
        }
    }

    /// Always contacts the remote and replaces the local copy on success.
    pub fn fetch(&self, path: &RepositoryPath, ctx: &FetchContext) -> Result<PathBuf> {
        let repository = self.storages.repository_for(path)?;
        let remote_url = repository
            .remote_url()
            .ok_or_else(|| DepotError::Unsupported(format!("{} is not a proxy repository", path)))?
            .to_string();

        self.locks
            .with_lock(path, || self.fetch_locked(&repository, &remote_url, path, ctx))
    }

    /// Serves the local copy when present, fetching only on a miss.
    ///
    /// Concurrent misses on one path result in a single remote request.
    pub fn resolve_path(&self, path: &RepositoryPath, ctx: &FetchContext) -> Result<PathBuf> {
        let repository = self.storages.repository_for(path)?;
        let local = repository.content_path(path);
        if local.is_file() {
            debug!(path = %path, "Serving cached copy");
            return Ok(local);
        }
        let Some(remote_url) = repository.remote_url().map(str::to_string) else {
            return Err(DepotError::ArtifactNotFound(path.to_string()));
        };

        self.locks.with_lock(path, || {
            if local.is_file() {
                debug!(path = %path, "Fetched by a concurrent request");
                return Ok(local.clone());
            }
            self.fetch_locked(&repository, &remote_url, path, ctx)
        })
    }

    fn fetch_locked(
        &self,
        repository: &Repository,
        remote_url: &str,
        path: &RepositoryPath,
        ctx: &FetchContext,
    ) -> Result<PathBuf> {
        ctx.check().map_err(DepotError::Transport)?;
        let response = self
            .remote
            .open(remote_url, path.path())?
            .ok_or_else(|| DepotError::ArtifactNotFound(path.to_string()))?;

        let mut body = response.body;
        let stored = store_stream(
            repository,
            path,
            &mut body,
            response.content_length,
            self.buffer_size,
            ctx,
            DepotError::Transport,
        )?;
        info!(path = %path, bytes = stored.size, "Fetched from remote");

        self.record_fetch(repository, path, &stored.target, stored.digests, stored.size)?;
        Ok(stored.target)
    }

    fn record_fetch(
        &self,
        repository: &Repository,
        path: &RepositoryPath,
        target: &Path,
        digests: ContentDigests,
        size: u64,
    ) -> Result<()> {
        if let Some((algorithm, described)) = path.checksum_target() {
            match parse_sidecar(&fs::read(target)?) {
                Some(digest) => {
                    debug!(path = %described, %algorithm, %digest, "Recorded remote checksum");
                    self.checksums.put(&described, algorithm, &digest);
                }
                None => {
                    warn!(path = %path, "Sidecar holds no checksum");
                    self.checksums.remove_digest(&described, algorithm);
                }
            }
            return Ok(());
        }

        let digests = digests.finish();
        for (algorithm, digest) in &digests {
            self.checksums.put(path, *algorithm, digest);
        }

        let Some(coordinates) = repository.layout().coordinates_for(path.path()) else {
            return Ok(());
        };
        let mut artifact = self
            .artifacts
            .find_one_artifact(path.storage_id(), path.repository_id(), path.path())?
            .unwrap_or_else(|| Artifact::remote(path.storage_id(), path.repository_id(), coordinates, true));
        artifact.kind = ArtifactKind::Remote { is_cached: true };
        artifact.size_in_bytes = Some(size);
        for (algorithm, digest) in digests {
            artifact.checksums.insert(algorithm.name().to_string(), digest);
        }
        self.artifacts.save(&artifact)?;
        Ok(())
    }
}

impl ForceFetch for ProxyFetchExecutor {
    fn resolve_path_force_fetch(&self, path: &RepositoryPath) -> Result<PathBuf> {
        self.fetch(path, &FetchContext::unbounded())
    }
}

/// Content that was streamed into place.
pub(crate) struct StoredContent {
    pub(crate) target: PathBuf,
    pub(crate) digests: ContentDigests,
    pub(crate) size: u64,
}

/// Streams `body` into `<basedir>/.temp` and renames it over the active copy.
///
/// Read failures, cancellation, deadlines and a length differing from
/// `content_length` go through `stream_error`; the temp file is removed and
/// the active copy is left as it was. A trashed copy of the path is
/// discarded once the new content is in place.
pub(crate) fn store_stream(
    repository: &Repository,
    path: &RepositoryPath,
    body: &mut dyn Read,
    content_length: Option<u64>,
    buffer_size: usize,
    ctx: &FetchContext,
    stream_error: fn(io::Error) -> DepotError,
) -> Result<StoredContent> {
    let temp_dir = repository.temp_dir();
    fs::create_dir_all(&temp_dir)?;
    let mut temp = TempDownload {
        path: temp_dir.join(uuid::Uuid::new_v4().to_string()),
        persisted: false,
    };

    let (digests, size) = stream_to(&temp.path, body, buffer_size, ctx).map_err(stream_error)?;
    if let Some(expected) = content_length {
        if size != expected {
            return Err(stream_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short body for {}: expected {} bytes, received {}", path, expected, size),
            )));
        }
    }

    let target = repository.content_path(path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&temp.path, &target)?;
    temp.persisted = true;

    discard_trashed_copy(repository, path)?;
    Ok(StoredContent {
        target,
        digests,
        size,
    })
}

fn stream_to(
    temp: &Path,
    body: &mut dyn Read,
    buffer_size: usize,
    ctx: &FetchContext,
) -> io::Result<(ContentDigests, u64)> {
    let mut file = File::create(temp)?;
    let mut digests = ContentDigests::new();
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut size = 0u64;
    loop {
        ctx.check()?;
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        file.write_all(&buf[..n])?;
        digests.update(&buf[..n]);
        size += n as u64;
    }
    file.sync_all()?;
    Ok((digests, size))
}

/// A fresh fetch supersedes a trashed copy of the same path.
fn discard_trashed_copy(repository: &Repository, path: &RepositoryPath) -> Result<()> {
    let trashed = repository.trash_path(path);
    match fs::remove_file(&trashed) {
        Ok(()) => {
            debug!(path = %path, "Discarded stale trashed copy");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DepotError::storage(format!("failed to discard trashed copy of {}", path), e)),
    }
}
