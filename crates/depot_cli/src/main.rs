//! Depot CLI - Command-line interface for the artifact depot.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use depot_core::{RepositoryLayout, RepositoryType};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Artifact repository manager with proxy caching", long_about = None)]
#[command(version)]
struct Cli {
    /// Depot root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new depot
    Init,
    /// Repository configuration
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Store a local file into a hosted repository
    Deploy {
        storage: String,
        repository: String,
        /// Repository-relative path
        path: String,
        /// File to upload
        file: PathBuf,
    },
    /// Serve a path, fetching from the remote for proxy repositories
    Resolve {
        storage: String,
        repository: String,
        path: String,
        /// Fetch even when a local copy exists
        #[arg(long)]
        force: bool,
    },
    /// Check whether a cached metadata file is still fresh
    Expire {
        storage: String,
        repository: String,
        path: String,
    },
    /// Show the artifact recorded at a path
    Show {
        storage: String,
        repository: String,
        path: String,
    },
    /// Delete a path
    Delete {
        storage: String,
        repository: String,
        path: String,
        /// Remove permanently instead of moving to the trash
        #[arg(long)]
        force: bool,
    },
    /// Trash management
    Trash {
        #[command(subcommand)]
        command: TrashCommands,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Add a repository to a storage
    Add {
        storage: String,
        id: String,
        /// Repository type
        #[arg(long = "type", value_enum, default_value = "hosted")]
        kind: RepoKind,
        /// Path layout
        #[arg(long, value_enum, default_value = "raw")]
        layout: LayoutKind,
        /// Upstream URL (proxy repositories)
        #[arg(long)]
        remote_url: Option<String>,
        /// Delete permanently instead of trashing
        #[arg(long)]
        no_trash: bool,
    },
    /// List configured repositories
    List,
}

#[derive(Subcommand)]
enum TrashCommands {
    /// Move content into the trash (one repository, or all)
    Empty {
        storage: Option<String>,
        repository: Option<String>,
    },
    /// Restore trashed content (one path, one repository, or all)
    Restore {
        storage: Option<String>,
        repository: Option<String>,
        path: Option<String>,
    },
    /// Permanently remove trashed content
    Purge {
        storage: Option<String>,
        repository: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RepoKind {
    Hosted,
    Proxy,
    Group,
}

impl From<RepoKind> for RepositoryType {
    fn from(kind: RepoKind) -> Self {
        match kind {
            RepoKind::Hosted => RepositoryType::Hosted,
            RepoKind::Proxy => RepositoryType::Proxy,
            RepoKind::Group => RepositoryType::Group,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutKind {
    Maven2,
    Raw,
}

impl From<LayoutKind> for RepositoryLayout {
    fn from(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Maven2 => RepositoryLayout::Maven2,
            LayoutKind::Raw => RepositoryLayout::Raw,
        }
    }
}

fn main() -> Result<()> {
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli.root.as_path();

    match cli.command {
        Commands::Init => commands::init::run(root),
        Commands::Repo { command } => match command {
            RepoCommands::Add {
                storage,
                id,
                kind,
                layout,
                remote_url,
                no_trash,
            } => commands::repo::add(
                root,
                &storage,
                &id,
                kind.into(),
                layout.into(),
                remote_url,
                !no_trash,
            ),
            RepoCommands::List => commands::repo::list(root),
        },
        Commands::Deploy {
            storage,
            repository,
            path,
            file,
        } => commands::artifact::deploy(root, &storage, &repository, &path, &file),
        Commands::Resolve {
            storage,
            repository,
            path,
            force,
        } => commands::artifact::resolve(root, &storage, &repository, &path, force),
        Commands::Expire {
            storage,
            repository,
            path,
        } => commands::expire::run(root, &storage, &repository, &path),
        Commands::Show {
            storage,
            repository,
            path,
        } => commands::artifact::show(root, &storage, &repository, &path),
        Commands::Delete {
            storage,
            repository,
            path,
            force,
        } => commands::artifact::delete(root, &storage, &repository, &path, force),
        Commands::Trash { command } => match command {
            TrashCommands::Empty {
                storage,
                repository,
            } => commands::trash::empty(root, scope(storage, repository)?),
            TrashCommands::Restore {
                storage,
                repository,
                path,
            } => commands::trash::restore(root, scope(storage, repository)?, path.as_deref()),
            TrashCommands::Purge {
                storage,
                repository,
            } => commands::trash::purge(root, scope(storage, repository)?),
        },
    }
}

/// Both ids or neither.
fn scope(storage: Option<String>, repository: Option<String>) -> Result<Option<(String, String)>> {
    match (storage, repository) {
        (Some(storage), Some(repository)) => Ok(Some((storage, repository))),
        (None, None) => Ok(None),
        _ => anyhow::bail!("storage and repository must be given together"),
    }
}
