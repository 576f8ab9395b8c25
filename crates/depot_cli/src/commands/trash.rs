//! Trash commands.

use anyhow::Result;
use console::style;
use std::io::{self, Write};
use std::path::Path;

/// Move live content into the trash.
pub fn empty(root: &Path, scope: Option<(String, String)>) -> Result<()> {
    let repo = super::open(root)?;

    let spinner = super::spinner(format!("Moving {} to the trash", describe(&scope)));
    let moved = match &scope {
        Some((storage, repository)) => repo.trash().delete_trash(storage, repository),
        None => repo.trash().delete_trash_all(),
    };
    spinner.finish_and_clear();
    let moved = moved.map_err(super::artifact::with_suggestion)?;

    println!(
        "{} Moved {} file(s) to the trash of {}",
        style("✓").green(),
        style(moved).cyan(),
        describe(&scope)
    );
    Ok(())
}

/// Restore trashed content.
pub fn restore(root: &Path, scope: Option<(String, String)>, path: Option<&str>) -> Result<()> {
    let repo = super::open(root)?;
    let trash = repo.trash();

    let spinner = super::spinner(format!("Restoring {}", describe(&scope)));
    let restored = match (&scope, path) {
        (Some((storage, repository)), Some(path)) => trash.undelete(storage, repository, path).map(|()| 1),
        (Some((storage, repository)), None) => trash.undelete_trash(storage, repository),
        (None, Some(_)) => {
            spinner.finish_and_clear();
            anyhow::bail!("a path requires a storage and repository")
        }
        (None, None) => trash.undelete_trash_all(),
    };
    spinner.finish_and_clear();
    let restored = restored.map_err(super::artifact::with_suggestion)?;

    println!(
        "{} Restored {} file(s) in {}",
        style("✓").green(),
        style(restored).cyan(),
        describe(&scope)
    );
    Ok(())
}

/// Permanently remove trashed content after confirmation.
pub fn purge(root: &Path, scope: Option<(String, String)>) -> Result<()> {
    let repo = super::open(root)?;

    println!();
    println!("{} {}", style("⚠").yellow().bold(), style("WARNING:").yellow().bold());
    println!("  Purging permanently deletes trashed files of {}.", describe(&scope));
    println!("  Purged files cannot be restored.");
    println!();
    print!("Continue with purge? [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if !input.trim().eq_ignore_ascii_case("y") {
        println!("{} Purge cancelled.", style("✓").green());
        return Ok(());
    }

    let spinner = super::spinner(format!("Purging {}", describe(&scope)));
    let purged = match &scope {
        Some((storage, repository)) => repo.trash().purge_trash(storage, repository),
        None => repo.trash().purge_trash_all(),
    };
    spinner.finish_and_clear();
    let purged = purged.map_err(super::artifact::with_suggestion)?;

    println!("{} Purged {} file(s)", style("✓").green(), style(purged).yellow());
    Ok(())
}

fn describe(scope: &Option<(String, String)>) -> String {
    match scope {
        Some((storage, repository)) => format!("{}:{}", storage, repository),
        None => "all repositories".to_string(),
    }
}
