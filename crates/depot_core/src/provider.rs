//! Repository providers and the registry that maps repository types onto them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Kind of repository as configured in `depot.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// Content is deployed locally.
    #[default]
    Hosted,
    /// Content is fetched from a remote origin and cached.
    Proxy,
    /// Aggregates other repositories.
    Group,
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hosted => "hosted",
            Self::Proxy => "proxy",
            Self::Group => "group",
        };
        f.write_str(name)
    }
}

/// What a provider does with the content it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCapability {
    /// Serves content stored locally.
    Local,
    /// Fetches from a remote origin and keeps a local cached copy.
    Caching,
    /// Delegates to member repositories.
    Aggregating,
}

/// A capability-tagged provider for one repository type.
pub trait RepositoryProvider: Send + Sync {
    /// Short name used in logs.
    fn alias(&self) -> &'static str;

    /// The provider's capability.
    fn capability(&self) -> ProviderCapability;

    /// True when the provider proxies and caches a remote origin.
    fn is_caching(&self) -> bool {
        self.capability() == ProviderCapability::Caching
    }
}

/// Provider for hosted repositories.
#[derive(Debug, Default)]
pub struct HostedRepositoryProvider;

impl RepositoryProvider for HostedRepositoryProvider {
    fn alias(&self) -> &'static str {
        "hosted"
    }

    fn capability(&self) -> ProviderCapability {
        ProviderCapability::Local
    }
}

/// Provider for proxy repositories.
#[derive(Debug, Default)]
pub struct ProxyRepositoryProvider;

impl RepositoryProvider for ProxyRepositoryProvider {
    fn alias(&self) -> &'static str {
        "proxy"
    }

    fn capability(&self) -> ProviderCapability {
        ProviderCapability::Caching
    }
}

/// Provider for group repositories.
#[derive(Debug, Default)]
pub struct GroupRepositoryProvider;

impl RepositoryProvider for GroupRepositoryProvider {
    fn alias(&self) -> &'static str {
        "group"
    }

    fn capability(&self) -> ProviderCapability {
        ProviderCapability::Aggregating
    }
}

/// Maps repository types onto providers.
///
/// Passed explicitly into the components that need it so tests can register
/// fake providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<RepositoryType, Arc<dyn RepositoryProvider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in hosted, proxy and group providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(RepositoryType::Hosted, Arc::new(HostedRepositoryProvider));
        registry.register(RepositoryType::Proxy, Arc::new(ProxyRepositoryProvider));
        registry.register(RepositoryType::Group, Arc::new(GroupRepositoryProvider));
        registry
    }

    /// Registers (or replaces) the provider for a repository type.
    pub fn register(&mut self, repository_type: RepositoryType, provider: Arc<dyn RepositoryProvider>) {
        self.providers.insert(repository_type, provider);
    }

    /// Returns the provider for a repository type.
    pub fn get_provider(&self, repository_type: RepositoryType) -> Option<Arc<dyn RepositoryProvider>> {
        self.providers.get(&repository_type).cloned()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<_> = self
            .providers
            .iter()
            .map(|(t, p)| format!("{}={}", t, p.alias()))
            .collect();
        aliases.sort();
        f.debug_struct("ProviderRegistry").field("providers", &aliases).finish()
    }
}
