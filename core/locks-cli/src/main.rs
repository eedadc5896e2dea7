//! lfs-locks: view and manage Git LFS file locks.
//!
//! ## Subcommands
//!
//! - `list`: Show active locks as a table, a tree, or JSON
//! - `lock` / `unlock`: Acquire or release a lock, following layout references
//! - `resolve`: Show which file `lock` would act on
//! - `reveal`: Map a path from the lock list back to the filesystem
//! - `watch`: Keep refreshing until Ctrl-C

mod commands;
mod logging;
mod panel;
mod tree;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lfs_locks_core::load_config;

use crate::commands::App;

#[derive(Parser)]
#[command(name = "lfs-locks")]
#[command(about = "View and manage Git LFS file locks")]
#[command(version)]
struct Cli {
    /// Any path inside the repository (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    repo: Option<PathBuf>,

    /// Program used to run `git lfs` (overrides config and LFS_LOCKS_GIT)
    #[arg(long, global = true, value_name = "PROGRAM")]
    git: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show active locks
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,

        /// Group locks by directory
        #[arg(long, conflicts_with = "json")]
        tree: bool,
    },

    /// Lock a file, or the layout file a report object references
    Lock {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Release a lock by file or by id
    Unlock {
        #[arg(value_name = "FILE", required_unless_present = "id")]
        file: Option<PathBuf>,

        /// Lock id from `list`
        #[arg(long, conflicts_with = "file")]
        id: Option<String>,

        /// Release a lock held by someone else
        #[arg(long)]
        force: bool,
    },

    /// Show which file a lock request would act on
    Resolve {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the absolute location of a path shown in the lock list
    Reveal {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Refresh periodically with the table and tree views attached
    Watch {
        /// Seconds between refreshes (defaults to refresh_interval_secs)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let mut config = load_config();
    if let Some(git) = cli.git {
        config.git_program = git;
    }

    let app = match App::new(&config, cli.repo) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "lfs-locks failed to start");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::List { json, tree } => app.list(json, tree).await,
        Commands::Lock { file } => app.lock(&file).await,
        Commands::Unlock { file, id, force } => app.unlock(file.as_deref(), id, force).await,
        Commands::Resolve { file } => app.resolve(&file).await,
        Commands::Reveal { path } => app.reveal(&path).await,
        Commands::Watch { interval } => app.watch(interval).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "lfs-locks failed");
        std::process::exit(1);
    }
}
