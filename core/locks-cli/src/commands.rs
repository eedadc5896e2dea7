//! Subcommand implementations.
//!
//! Every command builds on one shared controller. Commands that act for the
//! user (list, lock, unlock, watch) go through a presentation session so that
//! errors, command echoes and re-renders behave the same as in watch mode.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lfs_locks_core::paths::normalize_lexically;
use lfs_locks_core::{
    DiskFiles, GitLfsAuthority, LockError, LockStateStore, LockerConfig, PresentationSurface,
    ReconciliationController, SessionSlot, SurfaceOutcome, SurfaceRequest, SurfaceSession,
    WorkspaceContext,
};

use crate::panel::PanelSurface;
use crate::tree::TreeSurface;

pub type Controller = ReconciliationController<GitLfsAuthority, DiskFiles>;
type Session = SurfaceSession<GitLfsAuthority, DiskFiles>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{}", .0.report())]
    Lock(#[from] LockError),

    #[error("Could not determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("Failed to serialize lock list: {0}")]
    Json(#[from] serde_json::Error),

    /// The surface has already shown the details.
    #[error("{0} failed")]
    Request(&'static str),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Shared state for one CLI invocation.
pub struct App {
    controller: Arc<Controller>,
    cwd: PathBuf,
    anchor: PathBuf,
    refresh_interval: Duration,
}

impl App {
    pub fn new(config: &LockerConfig, repo: Option<PathBuf>) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(CliError::CurrentDir)?;
        let anchor = match repo {
            Some(repo) => absolutize(&cwd, &repo),
            None => cwd.clone(),
        };
        let authority = GitLfsAuthority::new(config.git_program.clone(), config.command_timeout());
        let controller = ReconciliationController::new(authority, DiskFiles, LockStateStore::new())
            .with_layout_extension(&config.layout_extension);

        tracing::debug!(
            anchor = %anchor.display(),
            git = %config.git_program,
            layout_extension = %config.layout_extension,
            "Starting"
        );

        Ok(Self {
            controller: Arc::new(controller),
            cwd,
            anchor,
            refresh_interval: config.refresh_interval(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // One-shot commands
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn list(&self, json: bool, tree: bool) -> Result<()> {
        if json {
            let ctx = WorkspaceContext::discover(&self.anchor)?;
            let snapshot = self.controller.refresh(ctx.root()).await?;
            println!("{}", serde_json::to_string_pretty(snapshot.records())?);
            return Ok(());
        }

        let session = if tree {
            self.open(Arc::new(TreeSurface))
        } else {
            self.open(Arc::new(PanelSurface))
        };
        let ok = session.refresh().await;
        session.close();
        ok.then_some(()).ok_or(CliError::Request("list"))
    }

    pub async fn lock(&self, file: &Path) -> Result<()> {
        let request = SurfaceRequest::Lock(absolutize(&self.cwd, file));
        self.request("lock", request).await
    }

    pub async fn unlock(&self, file: Option<&Path>, id: Option<String>, force: bool) -> Result<()> {
        let request = match (file, id) {
            (_, Some(id)) => SurfaceRequest::Unlock { id, force },
            (Some(file), None) => SurfaceRequest::UnlockFile {
                file: absolutize(&self.cwd, file),
                force,
            },
            (None, None) => return Err(CliError::Request("unlock")),
        };
        self.request("unlock", request).await
    }

    /// Shows what `lock` would act on without contacting the authority.
    pub async fn resolve(&self, file: &Path) -> Result<()> {
        let file = absolutize(&self.cwd, file);
        let ctx = WorkspaceContext::discover(&file)?;
        let target = self.controller.resolve_target(&ctx, &file).await?;

        match &target.reference {
            Some(reference) => println!(
                "{} -> {} (layout reference '{}')",
                file.display(),
                target.path,
                reference
            ),
            None => println!("{} -> {} (locks itself)", file.display(), target.path),
        }
        Ok(())
    }

    pub async fn reveal(&self, rendered: &str) -> Result<()> {
        let session = self.open(Arc::new(PanelSurface));
        let outcome = session.handle(SurfaceRequest::Reveal(rendered.to_string())).await;
        session.close();

        match outcome {
            SurfaceOutcome::Revealed(path) => {
                if !path.exists() {
                    tracing::warn!(path = %path.display(), "Revealed path does not exist");
                }
                println!("{}", path.display());
                Ok(())
            }
            _ => Err(CliError::Request("reveal")),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Watch
    // ─────────────────────────────────────────────────────────────────────────────

    /// Refreshes on a timer with both the panel and the tree attached.
    ///
    /// Only the panel asks for refreshes; the tree re-renders from the shared
    /// store. Failed refreshes are shown and the loop continues.
    pub async fn watch(&self, interval: Option<u64>) -> Result<()> {
        let period = interval
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(self.refresh_interval);

        let panel_slot = SessionSlot::new();
        let panel = panel_slot.show(&self.controller, &self.anchor, || {
            let surface: Arc<dyn PresentationSurface> = Arc::new(PanelSurface);
            surface
        });
        let tree = self.open(Arc::new(TreeSurface));

        tracing::info!(interval_secs = period.as_secs(), "Watching locks");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Registered once so a Ctrl-C during a slow refresh is not lost.
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut ctrl_c => break,
                        _ = panel.refresh() => {}
                    }
                }
            }
        }

        tree.close();
        panel_slot.close();
        Ok(())
    }

    fn open(&self, surface: Arc<dyn PresentationSurface>) -> Session {
        SurfaceSession::open(Arc::clone(&self.controller), surface, &self.anchor)
    }

    async fn request(&self, name: &'static str, request: SurfaceRequest) -> Result<()> {
        let session = self.open(Arc::new(PanelSurface));
        let outcome = session.handle(request).await;
        session.close();
        match outcome {
            SurfaceOutcome::Failed => Err(CliError::Request(name)),
            _ => Ok(()),
        }
    }
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&cwd.join(path))
    }
}
