//! Initialize a new depot.

use anyhow::{Context, Result};
use depot_core::DepotRepo;
use std::path::Path;

/// Initialize a new depot in `root`.
pub fn run(root: &Path) -> Result<()> {
    let repo = DepotRepo::init(root).context("Failed to initialize depot")?;

    println!("Initialized depot in {}", repo.root().display());
    println!();
    println!("Directory structure:");
    println!("  depot.toml   - Storages, repositories and fetch settings");
    println!("  graph/       - Artifact graph database");
    println!("  storages/    - Default storage base directories");
    println!();
    println!("Add a repository with 'depot repo add <storage> <id>'.");

    Ok(())
}
