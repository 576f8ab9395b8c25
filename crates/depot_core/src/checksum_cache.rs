//! Last-observed checksums per path and algorithm.
//!
//! The freshness engine compares the digest seen on the previous fetch with
//! the one the remote advertises now. Entries older than the configured
//! lifetime read as absent, which makes the next freshness check ambiguous
//! and therefore fetch.

use crate::checksum::ChecksumAlgorithm;
use crate::path::RepositoryPath;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Checksum lookups consumed by the freshness engine and fed by fetches.
pub trait ChecksumCache: Send + Sync {
    /// Last digest recorded for the path, if still valid.
    fn get(&self, path: &RepositoryPath, algorithm: ChecksumAlgorithm) -> Option<String>;

    /// Records a digest.
    fn put(&self, path: &RepositoryPath, algorithm: ChecksumAlgorithm, digest: &str);

    /// Forgets the digest of the path under one algorithm.
    fn remove_digest(&self, path: &RepositoryPath, algorithm: ChecksumAlgorithm);

    /// Forgets every digest of the path.
    fn remove(&self, path: &RepositoryPath);
}

struct CachedChecksum {
    digest: String,
    stored_at: Instant,
}

#[derive(Default)]
struct Entries {
    map: HashMap<(RepositoryPath, ChecksumAlgorithm), CachedChecksum>,
    last_sweep: Option<Instant>,
}

impl Entries {
    fn sweep(&mut self, lifetime: Duration) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.stored_at.elapsed() < lifetime);
        self.last_sweep = Some(Instant::now());
        before - self.map.len()
    }
}

/// In-memory [`ChecksumCache`] with a fixed entry lifetime.
///
/// Expired entries are dropped when read, and swept from the whole map on
/// a write once per lifetime.
pub struct ChecksumCacheManager {
    lifetime: Duration,
    entries: Mutex<Entries>,
}

impl ChecksumCacheManager {
    /// Creates an empty cache whose entries expire after `lifetime`.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Number of entries, expired ones not yet swept included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).map.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries.
    pub fn evict_expired(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sweep(self.lifetime)
    }
}

impl ChecksumCache for ChecksumCacheManager {
    fn get(&self, path: &RepositoryPath, algorithm: ChecksumAlgorithm) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (path.clone(), algorithm);
        let entry = entries.map.get(&key)?;
        if entry.stored_at.elapsed() < self.lifetime {
            return Some(entry.digest.clone());
        }
        entries.map.remove(&key);
        None
    }

    fn put(&self, path: &RepositoryPath, algorithm: ChecksumAlgorithm, digest: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let due = entries
            .last_sweep
            .map_or(true, |at| at.elapsed() >= self.lifetime);
        if due {
            let swept = entries.sweep(self.lifetime);
            if swept > 0 {
                debug!(swept, "Evicted expired checksums");
            }
        }
        entries.map.insert(
            (path.clone(), algorithm),
            CachedChecksum {
                digest: digest.to_string(),
                stored_at: Instant::now(),
            },
        );
    }

    fn remove_digest(&self, path: &RepositoryPath, algorithm: ChecksumAlgorithm) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.map.remove(&(path.clone(), algorithm));
    }

    fn remove(&self, path: &RepositoryPath) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for algorithm in ChecksumAlgorithm::FRESHNESS_ORDER {
            entries.map.remove(&(path.clone(), algorithm));
        }
    }
}
