//! Artifact commands: deploy, resolve, show, delete.

use anyhow::{Context, Result};
use console::style;
use depot_core::{DepotError, PathState};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Store a local file into a hosted repository.
pub fn deploy(root: &Path, storage: &str, repository: &str, path: &str, file: &Path) -> Result<()> {
    let repo = super::open(root)?;
    let target = repo.path(storage, repository, path)?;
    let mut content = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
    );

    match repo.deploy(&target, &mut content)? {
        Some(artifact) => {
            let uuid = artifact.uuid.map(|u| u.to_string()).unwrap_or_default();
            println!("{} Deployed {} ({})", style("✓").green(), target, style(uuid).dim());
            for (algorithm, digest) in &artifact.checksums {
                println!("  {:<5} {}", algorithm, digest);
            }
        }
        None => println!("{} Stored {}", style("✓").green(), target),
    }
    Ok(())
}

/// Serve a path, fetching it from the remote when needed.
pub fn resolve(root: &Path, storage: &str, repository: &str, path: &str, force: bool) -> Result<()> {
    let repo = super::open(root)?;
    let target = repo.path(storage, repository, path)?;

    let spinner = super::spinner(format!("Resolving {}", target));
    let resolved = repo.resolve(&target, force);
    spinner.finish_and_clear();

    match resolved {
        Ok(local) => {
            println!("{}", local.display());
            Ok(())
        }
        Err(e) => Err(with_suggestion(e)),
    }
}

/// Print the recorded artifact as JSON.
pub fn show(root: &Path, storage: &str, repository: &str, path: &str) -> Result<()> {
    let repo = super::open(root)?;
    let target = repo.path(storage, repository, path)?;

    let artifact = repo
        .show(&target)?
        .with_context(|| format!("No artifact recorded at {}", target))?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}

/// Delete a path, into the trash unless `force`.
pub fn delete(root: &Path, storage: &str, repository: &str, path: &str, force: bool) -> Result<()> {
    let repo = super::open(root)?;
    let target = repo.path(storage, repository, path)?;

    repo.delete(&target, force).map_err(with_suggestion)?;
    let state = match repo.state(&target)? {
        PathState::Active => "active",
        PathState::Trashed => "trashed",
        PathState::Absent => "removed",
    };
    println!("{} Deleted {} ({})", style("✓").green(), target, style(state).cyan());
    Ok(())
}

pub(crate) fn with_suggestion(e: DepotError) -> anyhow::Error {
    match e.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{}\n  {} {}", e, style("Hint:").cyan(), hint),
        None => e.into(),
    }
}
