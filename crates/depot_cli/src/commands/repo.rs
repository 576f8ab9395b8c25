//! Repository configuration commands.

use anyhow::{Context, Result};
use console::style;
use depot_core::{RepositoryConfig, RepositoryLayout, RepositoryType};
use std::path::Path;

/// Add a repository to a storage and persist the configuration.
pub fn add(
    root: &Path,
    storage_id: &str,
    id: &str,
    repository_type: RepositoryType,
    layout: RepositoryLayout,
    remote_url: Option<String>,
    trash_enabled: bool,
) -> Result<()> {
    let mut repo = super::open(root)?;
    let config = RepositoryConfig {
        id: id.to_string(),
        repository_type,
        layout,
        remote_url,
        trash_enabled,
    };
    repo.add_repository(storage_id, config)
        .with_context(|| format!("Failed to add repository {}:{}", storage_id, id))?;

    println!(
        "{} Added {} repository {}:{} ({})",
        style("✓").green(),
        repository_type,
        storage_id,
        style(id).cyan(),
        layout
    );
    Ok(())
}

/// List configured repositories.
pub fn list(root: &Path) -> Result<()> {
    let repo = super::open(root)?;

    for storage in repo.storages().storages() {
        println!("{} {}", style("Storage").bold(), style(storage.id()).cyan());
        println!("  basedir: {}", storage.basedir().display());
        for repository in storage.repositories() {
            let trash = if repository.trash_enabled() { "trash" } else { "no trash" };
            match repository.remote_url() {
                Some(url) => println!(
                    "  {:<20} {:<7} {:<7} {:<9} {}",
                    repository.id(),
                    repository.repository_type(),
                    repository.layout(),
                    trash,
                    style(url).dim()
                ),
                None => println!(
                    "  {:<20} {:<7} {:<7} {}",
                    repository.id(),
                    repository.repository_type(),
                    repository.layout(),
                    trash
                ),
            }
        }
    }
    Ok(())
}
