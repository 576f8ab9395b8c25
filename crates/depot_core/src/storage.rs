//! Storages, repositories and where their content lives on disk.

use crate::config::{Config, RepositoryConfig};
use crate::error::{DepotError, Result};
use crate::layout::RepositoryLayout;
use crate::path::{RepositoryPath, TEMP_DIR, TRASH_DIR};
use crate::provider::RepositoryType;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A configured repository with its resolved base directory.
#[derive(Debug, Clone)]
pub struct Repository {
    storage_id: String,
    config: RepositoryConfig,
    basedir: PathBuf,
}

impl Repository {
    /// Repository identifier.
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Owning storage identifier.
    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    /// Hosted, proxy or group.
    pub fn repository_type(&self) -> RepositoryType {
        self.config.repository_type
    }

    /// Content layout.
    pub fn layout(&self) -> RepositoryLayout {
        self.config.layout
    }

    /// Remote origin of a proxy repository.
    pub fn remote_url(&self) -> Option<&str> {
        self.config.remote_url.as_deref()
    }

    /// Whether deletes go to the trash area.
    pub fn trash_enabled(&self) -> bool {
        self.config.trash_enabled
    }

    /// Directory holding active content.
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Directory holding trashed content.
    pub fn trash_dir(&self) -> PathBuf {
        self.basedir.join(TRASH_DIR)
    }

    /// Directory holding in-flight downloads.
    pub fn temp_dir(&self) -> PathBuf {
        self.basedir.join(TEMP_DIR)
    }

    /// Location of the active copy of a path.
    pub fn content_path(&self, path: &RepositoryPath) -> PathBuf {
        self.basedir.join(path.path())
    }

    /// Location of the trashed copy of a path.
    pub fn trash_path(&self, path: &RepositoryPath) -> PathBuf {
        self.trash_dir().join(path.path())
    }

    /// Builds a path handle inside this repository.
    pub fn path(&self, relative: &str) -> Result<RepositoryPath> {
        RepositoryPath::new(&self.storage_id, self.id(), relative)
    }

    /// Relative paths of every active file, sorted.
    pub fn active_paths(&self) -> Result<Vec<String>> {
        list_files(&self.basedir, true)
    }

    /// Relative paths of every trashed file, sorted.
    pub fn trashed_paths(&self) -> Result<Vec<String>> {
        list_files(&self.trash_dir(), false)
    }
}

/// A storage and its repositories.
#[derive(Debug, Clone)]
pub struct Storage {
    id: String,
    basedir: PathBuf,
    repositories: BTreeMap<String, Arc<Repository>>,
}

impl Storage {
    /// Storage identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Storage base directory.
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Looks up a repository.
    pub fn repository(&self, repository_id: &str) -> Option<Arc<Repository>> {
        self.repositories.get(repository_id).cloned()
    }

    /// Repositories ordered by id.
    pub fn repositories(&self) -> impl Iterator<Item = &Arc<Repository>> {
        self.repositories.values()
    }
}

/// Every configured storage, resolved against a depot root.
#[derive(Debug, Clone, Default)]
pub struct StorageRegistry {
    storages: BTreeMap<String, Storage>,
}

impl StorageRegistry {
    /// Resolves the storages of a configuration.
    ///
    /// Storages without an explicit basedir live under `<root>/storages/<id>`.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        let storages = config
            .storages
            .iter()
            .map(|storage| {
                let basedir = storage
                    .basedir
                    .clone()
                    .unwrap_or_else(|| root.join("storages").join(&storage.id));
                let repositories = storage
                    .repositories
                    .iter()
                    .map(|repository| {
                        let resolved = Repository {
                            storage_id: storage.id.clone(),
                            config: repository.clone(),
                            basedir: basedir.join(&repository.id),
                        };
                        (repository.id.clone(), Arc::new(resolved))
                    })
                    .collect();
                let resolved = Storage {
                    id: storage.id.clone(),
                    basedir,
                    repositories,
                };
                (storage.id.clone(), resolved)
            })
            .collect();
        Self { storages }
    }

    /// Looks up a storage.
    pub fn get_storage(&self, storage_id: &str) -> Option<&Storage> {
        self.storages.get(storage_id)
    }

    /// Looks up a repository, distinguishing an unknown storage from an unknown repository.
    pub fn get_repository(&self, storage_id: &str, repository_id: &str) -> Result<Arc<Repository>> {
        let storage = self
            .get_storage(storage_id)
            .ok_or_else(|| DepotError::StorageNotFound(storage_id.to_string()))?;
        storage
            .repository(repository_id)
            .ok_or_else(|| DepotError::RepositoryNotFound {
                storage_id: storage_id.to_string(),
                repository_id: repository_id.to_string(),
            })
    }

    /// The repository a path belongs to.
    pub fn repository_for(&self, path: &RepositoryPath) -> Result<Arc<Repository>> {
        self.get_repository(path.storage_id(), path.repository_id())
    }

    /// Storages ordered by id.
    pub fn storages(&self) -> impl Iterator<Item = &Storage> {
        self.storages.values()
    }

    /// Every repository of every storage, ordered by storage then repository id.
    pub fn all_repositories(&self) -> Vec<Arc<Repository>> {
        self.storages
            .values()
            .flat_map(|storage| storage.repositories().cloned())
            .collect()
    }
}

/// Lists regular files below `dir` as `/`-separated relative paths.
///
/// With `skip_reserved`, the top-level trash and temp directories are skipped.
fn list_files(dir: &Path, skip_reserved: bool) -> Result<Vec<String>> {
    let mut files = Vec::new();
    if dir.is_dir() {
        collect_files(dir, "", skip_reserved, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, prefix: &str, skip_reserved: bool, files: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if skip_reserved && prefix.is_empty() && (name == TRASH_DIR || name == TEMP_DIR) {
            continue;
        }
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), &relative, skip_reserved, files)?;
        } else if file_type.is_file() {
            files.push(relative);
        }
    }
    Ok(())
}
