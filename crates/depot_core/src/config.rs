//! Configuration types for a depot root.

use crate::error::{DepotError, Result};
use crate::layout::RepositoryLayout;
use crate::provider::RepositoryType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the configuration inside the depot root.
pub const CONFIG_FILE: &str = "depot.toml";

/// Comprehensive configuration for a depot.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote transfer configuration.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Checksum cache configuration.
    #[serde(default)]
    pub checksum_cache: ChecksumCacheConfig,

    /// Configured storages and their repositories.
    #[serde(default)]
    pub storages: Vec<StorageConfig>,
}

impl Config {
    /// Load configuration from `depot.toml` in the given root.
    ///
    /// A missing file yields the default configuration.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| DepotError::ConfigError(format!("failed to read config: {}", e)))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| DepotError::ConfigError(format!("failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `depot.toml` in the given root.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| DepotError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| DepotError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    /// Rejects unsafe or duplicate ids and proxy repositories without a remote.
    pub fn validate(&self) -> Result<()> {
        let mut storage_ids = std::collections::HashSet::new();
        for storage in &self.storages {
            validate_id("storage", &storage.id)?;
            if !storage_ids.insert(storage.id.as_str()) {
                return Err(DepotError::ConfigError(format!(
                    "duplicate storage id: {}",
                    storage.id
                )));
            }
            let mut repository_ids = std::collections::HashSet::new();
            for repository in &storage.repositories {
                validate_id("repository", &repository.id)?;
                if !repository_ids.insert(repository.id.as_str()) {
                    return Err(DepotError::ConfigError(format!(
                        "duplicate repository id: {}:{}",
                        storage.id, repository.id
                    )));
                }
                if repository.repository_type == RepositoryType::Proxy
                    && repository.remote_url.is_none()
                {
                    return Err(DepotError::ConfigError(format!(
                        "proxy repository {}:{} has no remote_url",
                        storage.id, repository.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Adds a repository, creating the storage entry when needed.
    pub fn add_repository(&mut self, storage_id: &str, repository: RepositoryConfig) -> Result<()> {
        validate_id("storage", storage_id)?;
        validate_id("repository", &repository.id)?;
        if !self.storages.iter().any(|s| s.id == storage_id) {
            self.storages.push(StorageConfig {
                id: storage_id.to_string(),
                basedir: None,
                repositories: Vec::new(),
            });
        }
        let storage = self
            .storages
            .iter_mut()
            .find(|s| s.id == storage_id)
            .ok_or_else(|| DepotError::StorageNotFound(storage_id.to_string()))?;
        if storage.repositories.iter().any(|r| r.id == repository.id) {
            return Err(DepotError::ConfigError(format!(
                "repository already exists: {}:{}",
                storage_id, repository.id
            )));
        }
        storage.repositories.push(repository);
        self.validate()
    }
}

/// Ids name directories and are joined with `:` in graph keys.
fn validate_id(kind: &str, id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        "must not be empty"
    } else if id == "." || id == ".." {
        "must not be a relative segment"
    } else if id.starts_with('.') {
        "must not start with '.'"
    } else if id.contains([':', '/', '\\']) {
        "must not contain ':', '/' or '\\'"
    } else {
        return Ok(());
    };
    Err(DepotError::ConfigError(format!("invalid {} id {:?}: {}", kind, id, reason)))
}

/// Remote transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound for a single remote request in seconds (default: 300).
    pub timeout_secs: u64,

    /// Read buffer size used while streaming (default: 8192).
    pub buffer_size: usize,

    /// Attempts made by the serving path for a proxied artifact (default: 1, no retry).
    pub retry_attempts: u32,

    /// Pause between serving-path attempts in milliseconds (default: 250).
    pub retry_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            buffer_size: 8192,
            retry_attempts: 1,
            retry_backoff_ms: 250,
        }
    }
}

impl FetchConfig {
    /// Returns the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the retry backoff as a Duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Checksum cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumCacheConfig {
    /// How long an observed checksum stays valid, in seconds (default: 3600).
    pub lifetime_secs: u64,
}

impl Default for ChecksumCacheConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 60 * 60,
        }
    }
}

impl ChecksumCacheConfig {
    /// Returns the entry lifetime as a Duration.
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

/// A storage groups repositories under one directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage identifier.
    pub id: String,

    /// Base directory; defaults to `<root>/storages/<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basedir: Option<PathBuf>,

    /// Repositories of this storage.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// A single repository inside a storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository identifier.
    pub id: String,

    /// Hosted, proxy or group.
    #[serde(rename = "type", default)]
    pub repository_type: RepositoryType,

    /// Path layout of the repository content.
    #[serde(default)]
    pub layout: RepositoryLayout,

    /// Remote origin for proxy repositories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Whether deletes go to the trash area (default: true).
    #[serde(default = "default_true")]
    pub trash_enabled: bool,
}

impl RepositoryConfig {
    /// A hosted repository with the given layout.
    pub fn hosted(id: &str, layout: RepositoryLayout) -> Self {
        Self {
            id: id.to_string(),
            repository_type: RepositoryType::Hosted,
            layout,
            remote_url: None,
            trash_enabled: true,
        }
    }

    /// A proxy repository for the given remote.
    pub fn proxy(id: &str, layout: RepositoryLayout, remote_url: &str) -> Self {
        Self {
            id: id.to_string(),
            repository_type: RepositoryType::Proxy,
            layout,
            remote_url: Some(remote_url.to_string()),
            trash_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}
