//! Trash lifecycle: soft delete, restore and purge.
//!
//! A path is `Active` while its content lives in the repository basedir and
//! `Trashed` while it lives under `<basedir>/.trash`. Every move checks,
//! moves and updates the cached flag while holding the path's fetch lock.
//! Bulk operations journal their moves and undo them all when one fails;
//! files a move replaced are set aside in `.temp` and only deleted once the
//! whole batch succeeded.

use crate::artifact_repository::ArtifactRepository;
use crate::checksum_cache::ChecksumCache;
use crate::error::{DepotError, Result};
use crate::fetch::PathLocks;
use crate::path::RepositoryPath;
use crate::storage::{Repository, StorageRegistry};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where the content of a path currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathState {
    /// In the repository basedir.
    Active,
    /// In the trash area.
    Trashed,
    /// Nowhere.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToTrash,
    FromTrash,
}

impl Direction {
    /// Cached flag of a remote artifact once moved this way.
    fn cached(self) -> bool {
        self == Direction::FromTrash
    }
}

/// An applied move, kept until its batch commits or rolls back.
struct Move {
    path: RepositoryPath,
    direction: Direction,
    from: PathBuf,
    to: PathBuf,
    to_root: PathBuf,
    /// The file previously at `to`, parked in the temp area.
    displaced: Option<PathBuf>,
}

impl Move {
    /// Moves `from` over `to`, parking any file already at `to`.
    fn apply(
        repository: &Repository,
        path: &RepositoryPath,
        direction: Direction,
    ) -> Result<Option<Self>> {
        let (from, to, from_root, to_root) = match direction {
            Direction::ToTrash => (
                repository.content_path(path),
                repository.trash_path(path),
                repository.basedir().to_path_buf(),
                repository.trash_dir(),
            ),
            Direction::FromTrash => (
                repository.trash_path(path),
                repository.content_path(path),
                repository.trash_dir(),
                repository.basedir().to_path_buf(),
            ),
        };
        if !from.is_file() {
            return Ok(None);
        }

        let fail = |e: io::Error| {
            DepotError::storage(format!("failed to move {} to {}", from.display(), to.display()), e)
        };
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(fail)?;
        }
        let displaced = if to.is_file() {
            let temp_dir = repository.temp_dir();
            fs::create_dir_all(&temp_dir).map_err(fail)?;
            let parked = temp_dir.join(uuid::Uuid::new_v4().to_string());
            fs::rename(&to, &parked).map_err(fail)?;
            Some(parked)
        } else {
            None
        };

        if let Err(e) = fs::rename(&from, &to) {
            if let Some(parked) = &displaced {
                if let Err(restore) = fs::rename(parked, &to) {
                    error!(path = %path, error = %restore, "Failed to restore replaced file");
                }
            }
            return Err(fail(e));
        }
        prune_empty_parents(&from, &from_root);

        Ok(Some(Self {
            path: path.clone(),
            direction,
            from,
            to,
            to_root,
            displaced,
        }))
    }

    /// Puts the file back where it came from and returns the parked one.
    ///
    /// Returns false when `to` no longer holds the moved file, in which case
    /// the parked file is dropped.
    fn undo(self) -> Result<bool> {
        if !self.to.is_file() {
            self.commit();
            return Ok(false);
        }
        let fail = |e: io::Error| {
            DepotError::storage(
                format!("failed to move {} back to {}", self.to.display(), self.from.display()),
                e,
            )
        };
        if let Some(parent) = self.from.parent() {
            fs::create_dir_all(parent).map_err(fail)?;
        }
        fs::rename(&self.to, &self.from).map_err(fail)?;
        match &self.displaced {
            Some(parked) => fs::rename(parked, &self.to).map_err(fail)?,
            None => prune_empty_parents(&self.to, &self.to_root),
        }
        Ok(true)
    }

    /// Deletes the parked file, if any.
    fn commit(&self) {
        if let Some(parked) = &self.displaced {
            if let Err(e) = fs::remove_file(parked) {
                warn!(path = %self.path, error = %e, "Failed to remove replaced file");
            }
        }
    }
}

/// Moves artifacts into and out of the trash area.
pub struct TrashManager {
    storages: Arc<StorageRegistry>,
    artifacts: ArtifactRepository,
    checksums: Arc<dyn ChecksumCache>,
    locks: Arc<PathLocks>,
}

impl TrashManager {
    /// Creates a manager sharing `locks` with the fetch executor.
    pub fn new(
        storages: Arc<StorageRegistry>,
        artifacts: ArtifactRepository,
        checksums: Arc<dyn ChecksumCache>,
        locks: Arc<PathLocks>,
    ) -> Self {
        Self {
            storages,
            artifacts,
            checksums,
            locks,
        }
    }

    /// Current state of a path.
    pub fn state(&self, path: &RepositoryPath) -> Result<PathState> {
        let repository = self.storages.repository_for(path)?;
        Ok(if repository.content_path(path).is_file() {
            PathState::Active
        } else if repository.trash_path(path).is_file() {
            PathState::Trashed
        } else {
            PathState::Absent
        })
    }

    /// Moves one active path into the trash area.
    pub fn trash(&self, path: &RepositoryPath) -> Result<()> {
        let repository = self.storages.repository_for(path)?;
        self.locks.with_lock(path, || -> Result<()> {
            let entry = self
                .apply(&repository, path, Direction::ToTrash)?
                .ok_or_else(|| DepotError::ArtifactNotFound(path.to_string()))?;
            entry.commit();
            Ok(())
        })?;
        info!(path = %path, "Moved to trash");
        Ok(())
    }

    /// Deletes a path: into the trash when the repository keeps one and
    /// `force` is not set, permanently otherwise.
    pub fn delete(&self, path: &RepositoryPath, force: bool) -> Result<()> {
        let repository = self.storages.repository_for(path)?;
        if repository.trash_enabled() && !force {
            return self.trash(path);
        }

        let source = repository.content_path(path);
        self.locks.with_lock(path, || -> Result<()> {
            let removed = match fs::remove_file(&source) {
                Ok(()) => {
                    prune_empty_parents(&source, repository.basedir());
                    true
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                Err(e) => return Err(DepotError::storage(format!("failed to delete {}", path), e)),
            };
            let forgotten = self.forget(path)?;
            if !removed && !forgotten {
                return Err(DepotError::ArtifactNotFound(path.to_string()));
            }
            Ok(())
        })?;
        info!(path = %path, "Deleted permanently");
        Ok(())
    }

    /// Moves every active file of a repository into its trash area.
    ///
    /// Returns the number of moved files.
    pub fn delete_trash(&self, storage_id: &str, repository_id: &str) -> Result<usize> {
        let repository = self.storages.get_repository(storage_id, repository_id)?;
        let moved = self.move_all(&[repository], Direction::ToTrash)?;
        debug!(storage = storage_id, repository = repository_id, moved, "Deleted trash for repository");
        Ok(moved)
    }

    /// [`Self::delete_trash`] for every repository of every storage.
    pub fn delete_trash_all(&self) -> Result<usize> {
        let moved = self.move_all(&self.storages.all_repositories(), Direction::ToTrash)?;
        debug!(moved, "Deleted trash for all repositories");
        Ok(moved)
    }

    /// Restores one trashed path, replacing any active copy.
    pub fn undelete(&self, storage_id: &str, repository_id: &str, path: &str) -> Result<()> {
        let repository = self.storages.get_repository(storage_id, repository_id)?;
        let path = repository.path(path)?;
        self.locks.with_lock(&path, || -> Result<()> {
            let entry = self
                .apply(&repository, &path, Direction::FromTrash)?
                .ok_or_else(|| DepotError::TrashedPathNotFound(path.to_string()))?;
            entry.commit();
            Ok(())
        })?;
        info!(path = %path, "Restored from trash");
        Ok(())
    }

    /// Restores every trashed file of a repository.
    pub fn undelete_trash(&self, storage_id: &str, repository_id: &str) -> Result<usize> {
        let repository = self.storages.get_repository(storage_id, repository_id)?;
        let restored = self.move_all(&[repository], Direction::FromTrash)?;
        debug!(storage = storage_id, repository = repository_id, restored, "Undeleted trash for repository");
        Ok(restored)
    }

    /// [`Self::undelete_trash`] for every repository of every storage.
    pub fn undelete_trash_all(&self) -> Result<usize> {
        let restored = self.move_all(&self.storages.all_repositories(), Direction::FromTrash)?;
        debug!(restored, "Undeleted trash for all repositories");
        Ok(restored)
    }

    /// Permanently empties the trash area of a repository.
    ///
    /// Graph records and cached checksums of purged paths without an active
    /// copy are deleted too. Purging cannot be rolled back.
    pub fn purge_trash(&self, storage_id: &str, repository_id: &str) -> Result<usize> {
        let repository = self.storages.get_repository(storage_id, repository_id)?;
        self.purge(&repository)
    }

    /// [`Self::purge_trash`] for every repository of every storage.
    pub fn purge_trash_all(&self) -> Result<usize> {
        let mut purged = 0;
        for repository in self.storages.all_repositories() {
            purged += self.purge(&repository)?;
        }
        Ok(purged)
    }

    fn purge(&self, repository: &Repository) -> Result<usize> {
        let mut purged = 0;
        for relative in repository.trashed_paths()? {
            let path = repository.path(&relative)?;
            let trashed = repository.trash_path(&path);
            self.locks.with_lock(&path, || -> Result<()> {
                match fs::remove_file(&trashed) {
                    Ok(()) => {}
                    // Discarded by a fetch since the listing.
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(DepotError::storage(format!("failed to purge {}", path), e)),
                }
                if !repository.content_path(&path).is_file() {
                    self.forget(&path)?;
                }
                purged += 1;
                Ok(())
            })?;
        }
        let trash_dir = repository.trash_dir();
        if trash_dir.is_dir() {
            fs::remove_dir_all(&trash_dir)
                .map_err(|e| DepotError::storage(format!("failed to remove {}", trash_dir.display()), e))?;
        }
        info!(
            storage = repository.storage_id(),
            repository = repository.id(),
            purged,
            "Purged trash"
        );
        Ok(purged)
    }

    /// Moves one path and updates its cached flag. The caller holds the
    /// path's lock.
    fn apply(
        &self,
        repository: &Repository,
        path: &RepositoryPath,
        direction: Direction,
    ) -> Result<Option<Move>> {
        let Some(entry) = Move::apply(repository, path, direction)? else {
            return Ok(None);
        };
        if let Err(e) = self.mark_cached(path, direction.cached()) {
            if let Err(undo) = entry.undo() {
                error!(path = %path, error = %undo, "Failed to undo move");
            }
            return Err(e);
        }
        Ok(Some(entry))
    }

    fn move_all(&self, repositories: &[Arc<Repository>], direction: Direction) -> Result<usize> {
        let mut journal = Vec::new();
        if let Err(e) = self.move_batch(repositories, direction, &mut journal) {
            error!(error = %e, moved = journal.len(), "Move failed, rolling back");
            self.rollback(journal);
            return Err(e);
        }
        for entry in &journal {
            entry.commit();
        }
        Ok(journal.len())
    }

    fn move_batch(
        &self,
        repositories: &[Arc<Repository>],
        direction: Direction,
        journal: &mut Vec<Move>,
    ) -> Result<()> {
        for repository in repositories {
            let relatives = match direction {
                Direction::ToTrash => repository.active_paths()?,
                Direction::FromTrash => repository.trashed_paths()?,
            };
            for relative in relatives {
                let path = repository.path(&relative)?;
                match self.locks.with_lock(&path, || self.apply(repository, &path, direction))? {
                    Some(entry) => journal.push(entry),
                    None => debug!(path = %path, "Moved by a concurrent request"),
                }
            }
        }
        Ok(())
    }

    /// Undoes applied moves, newest first.
    fn rollback(&self, journal: Vec<Move>) {
        for entry in journal.into_iter().rev() {
            let path = entry.path.clone();
            let restored_flag = !entry.direction.cached();
            let undone = self.locks.with_lock(&path, || -> Result<()> {
                if entry.undo()? {
                    self.mark_cached(&path, restored_flag)?;
                }
                Ok(())
            });
            if let Err(e) = undone {
                error!(path = %path, error = %e, "Rollback failed");
            }
        }
    }

    /// Keeps the cached flag of a remote artifact in step with its content.
    fn mark_cached(&self, path: &RepositoryPath, cached: bool) -> Result<()> {
        self.artifacts
            .set_cached(path.storage_id(), path.repository_id(), path.path(), cached)?;
        Ok(())
    }

    /// Drops the graph record and cached checksums of a path.
    fn forget(&self, path: &RepositoryPath) -> Result<bool> {
        self.checksums.remove(path);
        match self
            .artifacts
            .find_one_artifact(path.storage_id(), path.repository_id(), path.path())?
        {
            Some(artifact) => self.artifacts.delete(&artifact),
            None => Ok(false),
        }
    }
}

/// Removes empty directories from `file`'s parent up to, not including, `root`.
fn prune_empty_parents(file: &Path, root: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk.
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}
