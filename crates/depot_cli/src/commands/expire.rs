//! Metadata freshness check.

use anyhow::Result;
use console::style;
use std::path::Path;

/// Run the expiry handlers for a cached path and print their decisions.
///
/// The previous checksums are taken from the local copy.
pub fn run(root: &Path, storage: &str, repository: &str, path: &str) -> Result<()> {
    let repo = super::open(root)?;
    let target = repo.path(storage, repository, path)?;

    // Each run starts with an empty checksum cache
    repo.prime_checksums(&target)?;

    let report = repo.expire(&target);
    if report.outcomes.is_empty() {
        println!("{} No handler applies to {}", style("ℹ").blue(), target);
        return Ok(());
    }

    println!("{} {}", style("Expiry of").bold(), target);
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(decision) => println!("  {} {}: {}", style("✓").green(), outcome.handler, decision),
            Err(message) => println!("  {} {}: {}", style("×").red(), outcome.handler, message),
        }
    }

    if !report.is_success() {
        anyhow::bail!("expiry handling failed for {}", target);
    }
    Ok(())
}
