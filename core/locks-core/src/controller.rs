//! Reconciliation: fetch → store → broadcast, and the lock/unlock flow.
//!
//! ```text
//! refresh:  Idle → Fetching → Idle | Error
//! lock:     Idle → Resolving → Mutating → Fetching → Idle | Error
//! unlock:   Idle → Mutating → Fetching → Idle | Error
//! ```
//!
//! # Coalescing
//!
//! At most one `list` runs per repository root. A refresh that arrives while a
//! fetch is in flight waits for that fetch and shares its result, as long as the
//! fetch started after the caller's view of the world: every finished mutation
//! bumps an epoch, and a refresh never joins a fetch from an older epoch. That
//! is what makes concurrent lock/unlock calls converge on the authority's final
//! state instead of on whichever list happened to be running.
//!
//! # Failure policy
//!
//! A failed fetch leaves the store untouched and is returned to the caller only.
//! Observers hear about successful swaps, never about errors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;

use crate::authority::{AuthorityCommand, LockAuthority, ReleaseTarget};
use crate::error::Result;
use crate::files::FileAccess;
use crate::reference::{resolve_lock_target, LockTarget};
use crate::store::LockStateStore;
use crate::types::{LockSnapshot, WorkspaceContext};

pub const DEFAULT_LAYOUT_EXTENSION: &str = "al";

/// Shared outcome of one fetch.
pub type RefreshResult = Result<Arc<LockSnapshot>>;

/// Where a session currently is in the reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Fetching,
    Resolving,
    Mutating,
    Error(String),
}

/// Result of a mutation that reached the authority.
#[derive(Debug, Clone)]
pub struct MutationReport {
    /// Equivalent shell command, echoed to the user.
    pub command_line: String,
    /// Outcome of `acquire`/`release` itself.
    pub mutation: Result<()>,
    /// Outcome of the trailing refresh, which runs regardless of `mutation`.
    pub refresh: RefreshResult,
}

impl MutationReport {
    pub fn succeeded(&self) -> bool {
        self.mutation.is_ok()
    }
}

struct InFlight {
    epoch: u64,
    done: watch::Receiver<Option<RefreshResult>>,
}

enum Role {
    Leader(watch::Sender<Option<RefreshResult>>),
    Follower {
        joinable: bool,
        done: watch::Receiver<Option<RefreshResult>>,
    },
}

/// Removes the in-flight entry even if the leading future is dropped mid-fetch,
/// so waiters fall through and retry instead of hanging.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<PathBuf, InFlight>>,
    root: PathBuf,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock_map(self.in_flight).remove(&self.root);
    }
}

/// Orchestrates authority calls against the shared [`LockStateStore`].
///
/// One controller serves every open surface. It keeps no per-surface state and
/// takes the workspace per call; see [`crate::session`] for the per-surface
/// state machine.
pub struct ReconciliationController<A, P> {
    authority: A,
    files: P,
    store: LockStateStore,
    layout_extension: String,
    epoch: AtomicU64,
    in_flight: Mutex<HashMap<PathBuf, InFlight>>,
}

impl<A: LockAuthority, P: FileAccess> ReconciliationController<A, P> {
    pub fn new(authority: A, files: P, store: LockStateStore) -> Self {
        Self {
            authority,
            files,
            store,
            layout_extension: DEFAULT_LAYOUT_EXTENSION.to_string(),
            epoch: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Extension of source files that redirect to a layout file.
    pub fn with_layout_extension(mut self, extension: &str) -> Self {
        self.layout_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn store(&self) -> &LockStateStore {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────────────

    /// Fetches the lock set for `root` and swaps it into the store.
    ///
    /// Concurrent calls for the same root share one fetch. On failure the store
    /// keeps its previous snapshot.
    pub async fn refresh(&self, root: &Path) -> RefreshResult {
        let wanted_epoch = self.epoch.load(Ordering::SeqCst);

        loop {
            match self.claim(root, wanted_epoch) {
                Role::Leader(done) => return self.lead_fetch(root, done).await,
                Role::Follower { joinable, mut done } => {
                    let shared = done
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|result| result.clone());
                    match shared {
                        Some(result) if joinable => {
                            tracing::debug!(root = %root.display(), "Joined in-flight refresh");
                            return result;
                        }
                        // Stale or abandoned fetch: start over once it is gone.
                        _ => continue,
                    }
                }
            }
        }
    }

    fn claim(&self, root: &Path, wanted_epoch: u64) -> Role {
        let mut in_flight = lock_map(&self.in_flight);
        if let Some(entry) = in_flight.get(root) {
            return Role::Follower {
                joinable: entry.epoch >= wanted_epoch,
                done: entry.done.clone(),
            };
        }

        let (sender, receiver) = watch::channel(None);
        in_flight.insert(
            root.to_path_buf(),
            InFlight {
                epoch: self.epoch.load(Ordering::SeqCst),
                done: receiver,
            },
        );
        Role::Leader(sender)
    }

    async fn lead_fetch(
        &self,
        root: &Path,
        done: watch::Sender<Option<RefreshResult>>,
    ) -> RefreshResult {
        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            root: root.to_path_buf(),
        };

        let result = self.fetch(root).await;

        // Unregister before publishing so a caller arriving now starts a new fetch.
        drop(guard);
        done.send_replace(Some(result.clone()));
        result
    }

    async fn fetch(&self, root: &Path) -> RefreshResult {
        self.authority.verify_available(root).await?;
        match self.authority.list_locks(root).await {
            Ok(snapshot) => Ok(self.store.replace(snapshot)),
            Err(err) => {
                tracing::warn!(
                    root = %root.display(),
                    error = %err,
                    "Refresh failed; keeping previous snapshot"
                );
                Err(err)
            }
        }
    }

    /// [`Self::refresh`] with state reporting for a single session.
    pub async fn reconcile(&self, root: &Path, phases: &dyn PhaseObserver) -> RefreshResult {
        phases.enter(ControllerState::Fetching);
        let result = self.refresh(root).await;
        settle(phases, &result);
        result
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Determines what locking `file` would actually lock. No authority calls.
    pub async fn resolve_target(&self, ctx: &WorkspaceContext, file: &Path) -> Result<LockTarget> {
        resolve_lock_target(&self.files, ctx, file, &self.layout_extension).await
    }

    /// Resolves `file` and locks its target.
    ///
    /// Resolution failures abort before any authority call. Once the authority
    /// has been asked to mutate, a [`MutationReport`] is returned even when the
    /// mutation itself was rejected.
    pub async fn request_lock(
        &self,
        ctx: &WorkspaceContext,
        file: &Path,
        phases: &dyn PhaseObserver,
    ) -> Result<(LockTarget, MutationReport)> {
        let target = self.resolve_with(ctx, file, phases).await?;
        let command = AuthorityCommand::Acquire {
            path: target.path.clone(),
        };
        let report = self.mutate(ctx.root(), command, phases).await?;
        Ok((target, report))
    }

    /// Releases a lock by id.
    pub async fn request_unlock(
        &self,
        ctx: &WorkspaceContext,
        lock_id: &str,
        force: bool,
        phases: &dyn PhaseObserver,
    ) -> Result<MutationReport> {
        let command = AuthorityCommand::Release {
            target: ReleaseTarget::Id(lock_id.to_string()),
            force,
        };
        self.mutate(ctx.root(), command, phases).await
    }

    /// Resolves `file` the same way as [`Self::request_lock`] and releases its
    /// target by path.
    pub async fn request_unlock_file(
        &self,
        ctx: &WorkspaceContext,
        file: &Path,
        force: bool,
        phases: &dyn PhaseObserver,
    ) -> Result<(LockTarget, MutationReport)> {
        let target = self.resolve_with(ctx, file, phases).await?;
        let command = AuthorityCommand::Release {
            target: ReleaseTarget::Path(target.path.clone()),
            force,
        };
        let report = self.mutate(ctx.root(), command, phases).await?;
        Ok((target, report))
    }

    async fn resolve_with(
        &self,
        ctx: &WorkspaceContext,
        file: &Path,
        phases: &dyn PhaseObserver,
    ) -> Result<LockTarget> {
        phases.enter(ControllerState::Resolving);
        let target = self.resolve_target(ctx, file).await;
        if let Err(err) = &target {
            phases.enter(ControllerState::Error(err.report()));
        }
        target
    }

    async fn mutate(
        &self,
        root: &Path,
        command: AuthorityCommand,
        phases: &dyn PhaseObserver,
    ) -> Result<MutationReport> {
        phases.enter(ControllerState::Mutating);
        if let Err(err) = self.authority.verify_available(root).await {
            phases.enter(ControllerState::Error(err.report()));
            return Err(err);
        }

        let command_line = command.command_line(self.authority.program());
        tracing::info!(root = %root.display(), command = %command_line, "Lock mutation");

        let mutation = match &command {
            AuthorityCommand::Acquire { path } => self.authority.acquire(root, path).await,
            AuthorityCommand::Release { target, force } => {
                self.authority.release(root, target, *force).await
            }
            AuthorityCommand::Version | AuthorityCommand::List => Ok(()),
        };
        if let Err(err) = &mutation {
            tracing::warn!(command = %command_line, error = %err, "Lock mutation failed");
        }

        // Whatever happened, the authority may have changed; reconcile.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        phases.enter(ControllerState::Fetching);
        let refresh = self.refresh(root).await;

        match (&mutation, &refresh) {
            (Err(err), _) | (Ok(()), Err(err)) => {
                phases.enter(ControllerState::Error(err.report()))
            }
            (Ok(()), Ok(_)) => phases.enter(ControllerState::Idle),
        }

        Ok(MutationReport {
            command_line,
            mutation,
            refresh,
        })
    }
}

/// Receives the state transitions of one request.
pub trait PhaseObserver {
    fn enter(&self, state: ControllerState);
}

/// No-op observer for callers that do not track state.
impl PhaseObserver for () {
    fn enter(&self, _state: ControllerState) {}
}

fn settle<T>(phases: &dyn PhaseObserver, result: &Result<T>) {
    match result {
        Ok(_) => phases.enter(ControllerState::Idle),
        Err(err) => phases.enter(ControllerState::Error(err.report())),
    }
}

fn lock_map(map: &Mutex<HashMap<PathBuf, InFlight>>) -> MutexGuard<'_, HashMap<PathBuf, InFlight>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
