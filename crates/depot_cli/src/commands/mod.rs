//! CLI commands.

pub mod artifact;
pub mod expire;
pub mod init;
pub mod repo;
pub mod trash;

use anyhow::{Context, Result};
use depot_core::DepotRepo;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Opens the depot at `root` with a readable error.
pub(crate) fn open(root: &Path) -> Result<DepotRepo> {
    tracing::debug!(root = %root.display(), "Opening depot");
    DepotRepo::open(root).with_context(|| format!("Failed to open depot at {}", root.display()))
}

/// Steady spinner for operations without a known length.
pub(crate) fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
