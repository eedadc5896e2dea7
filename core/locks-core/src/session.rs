//! Presentation sessions.
//!
//! A [`SurfaceSession`] ties one presentation surface (a detail panel, a tree,
//! anything implementing [`PresentationSurface`]) to the shared controller:
//!
//! - it subscribes the surface to the store, so every successful swap re-renders it
//! - it translates surface requests ([`SurfaceRequest`]) into controller calls
//! - it keeps that surface's [`ControllerState`] and routes errors to it alone
//!
//! A session only renders snapshots fetched for its own repository: the root of
//! the workspace it most recently resolved, starting with the anchor's.
//!
//! Closing a session unsubscribes the surface. Work still in flight for a
//! closed session finishes against the shared store as usual, but nothing more
//! is delivered to the surface.
//!
//! [`SessionSlot`] owns the "is the panel open" question: the first `show`
//! creates the session, later ones reuse it, `close` tears it down.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::authority::LockAuthority;
use crate::controller::{ControllerState, MutationReport, PhaseObserver, ReconciliationController};
use crate::error::{LockError, Result};
use crate::paths;
use crate::files::FileAccess;
use crate::reference::LockTarget;
use crate::store::Subscription;
use crate::types::{LockSnapshot, WorkspaceContext};

/// A consumer of lock state.
pub trait PresentationSurface: Send + Sync {
    /// A new snapshot was swapped in.
    fn update(&self, snapshot: &LockSnapshot);

    /// A request made from this surface failed.
    fn error(&self, message: &str);

    /// Informational message, e.g. the shell command equivalent of a mutation.
    fn notice(&self, _message: &str) {}
}

/// Gestures a surface can forward to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceRequest {
    Refresh,
    Lock(PathBuf),
    Unlock { id: String, force: bool },
    UnlockFile { file: PathBuf, force: bool },
    Reveal(String),
}

/// What a handled request produced beyond the store update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOutcome {
    Done,
    Revealed(PathBuf),
    Failed,
}

struct StateCell {
    state: Mutex<ControllerState>,
}

impl StateCell {
    fn get(&self) -> MutexGuard<'_, ControllerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PhaseObserver for StateCell {
    fn enter(&self, state: ControllerState) {
        tracing::trace!(?state, "Session state");
        *self.get() = state;
    }
}

type SharedRoot = Arc<Mutex<Option<PathBuf>>>;

fn shows(root: &SharedRoot, snapshot: &LockSnapshot) -> bool {
    let root = root.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    root.is_some() && snapshot.root() == root.as_deref()
}

/// One open surface bound to the shared controller.
pub struct SurfaceSession<A, P> {
    controller: Arc<ReconciliationController<A, P>>,
    surface: Arc<dyn PresentationSurface>,
    anchor: PathBuf,
    root: SharedRoot,
    state: StateCell,
    closed: Arc<AtomicBool>,
    subscription: Mutex<Option<Subscription>>,
}

impl<A: LockAuthority, P: FileAccess> SurfaceSession<A, P> {
    /// Subscribes `surface` and immediately shows whatever the store already has.
    ///
    /// `anchor` is any path inside the repository; the repository root is
    /// re-derived from it on every request.
    pub fn open(
        controller: Arc<ReconciliationController<A, P>>,
        surface: Arc<dyn PresentationSurface>,
        anchor: &Path,
    ) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let root: SharedRoot = Arc::new(Mutex::new(
            WorkspaceContext::discover(anchor)
                .ok()
                .map(|ctx| ctx.root().to_path_buf()),
        ));

        let weak_surface = Arc::downgrade(&surface);
        let closed_flag = Arc::clone(&closed);
        let observed_root = Arc::clone(&root);
        let subscription = controller.store().subscribe(move |snapshot| {
            if closed_flag.load(Ordering::SeqCst) || !shows(&observed_root, snapshot) {
                return;
            }
            if let Some(surface) = weak_surface.upgrade() {
                surface.update(snapshot);
            }
        });

        let current = controller.store().current();
        if shows(&root, &current) {
            surface.update(&current);
        }

        Self {
            controller,
            surface,
            anchor: anchor.to_path_buf(),
            root,
            state: StateCell {
                state: Mutex::new(ControllerState::Idle),
            },
            closed,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state.get().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops all delivery to the surface. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        tracing::debug!(anchor = %self.anchor.display(), "Session closed");
    }

    /// Dispatches a surface gesture.
    pub async fn handle(&self, request: SurfaceRequest) -> SurfaceOutcome {
        let ok = match request {
            SurfaceRequest::Refresh => self.refresh().await,
            SurfaceRequest::Lock(file) => self.lock(&file).await,
            SurfaceRequest::Unlock { id, force } => self.unlock(&id, force).await,
            SurfaceRequest::UnlockFile { file, force } => self.unlock_file(&file, force).await,
            SurfaceRequest::Reveal(path) => {
                return match self.reveal(&path) {
                    Some(absolute) => SurfaceOutcome::Revealed(absolute),
                    None => SurfaceOutcome::Failed,
                }
            }
        };
        if ok {
            SurfaceOutcome::Done
        } else {
            SurfaceOutcome::Failed
        }
    }

    /// Re-fetches the lock list. The surface is re-rendered by the store swap.
    pub async fn refresh(&self) -> bool {
        let Some(ctx) = self.workspace(&self.anchor) else {
            return false;
        };
        match self.controller.reconcile(ctx.root(), &self.state).await {
            Ok(_) => true,
            Err(err) => {
                self.report_error(&err);
                false
            }
        }
    }

    /// Locks `file`, or the layout file it references.
    pub async fn lock(&self, file: &Path) -> bool {
        let file = self.absolutize(file);
        let Some(ctx) = self.workspace(&file) else {
            return false;
        };
        let result = self.controller.request_lock(&ctx, &file, &self.state).await;
        self.finish("Locked", result.map(|(target, report)| (Some(target), report)))
    }

    /// Releases a lock by id, typically from an "Unlock" button in a list.
    pub async fn unlock(&self, lock_id: &str, force: bool) -> bool {
        let Some(ctx) = self.workspace(&self.anchor) else {
            return false;
        };
        let result = self
            .controller
            .request_unlock(&ctx, lock_id, force, &self.state)
            .await;
        self.finish(
            &format!("Unlocked lock {}", lock_id),
            result.map(|report| (None, report)),
        )
    }

    /// Releases the lock on `file`, or on the layout file it references.
    pub async fn unlock_file(&self, file: &Path, force: bool) -> bool {
        let file = self.absolutize(file);
        let Some(ctx) = self.workspace(&file) else {
            return false;
        };
        let result = self
            .controller
            .request_unlock_file(&ctx, &file, force, &self.state)
            .await;
        self.finish("Unlocked", result.map(|(target, report)| (Some(target), report)))
    }

    /// Maps a path as rendered in the lock list back to an absolute location.
    pub fn reveal(&self, rendered_path: &str) -> Option<PathBuf> {
        let ctx = self.workspace(&self.anchor)?;
        Some(paths::combine_paths(ctx.root(), rendered_path))
    }

    fn finish(
        &self,
        action: &str,
        result: Result<(Option<LockTarget>, MutationReport)>,
    ) -> bool {
        let (target, report) = match result {
            Ok(pair) => pair,
            Err(err) => {
                self.report_error(&err);
                return false;
            }
        };

        self.notify(&format!("$ {}", report.command_line));
        if let Err(err) = &report.mutation {
            self.report_error(err);
            return false;
        }

        match &target {
            Some(LockTarget {
                path,
                reference: Some(reference),
                source,
            }) => self.notify(&format!(
                "{} {} (layout '{}' of {})",
                action,
                path,
                reference,
                paths::display_name(source)
            )),
            Some(target) => self.notify(&format!("{} {}", action, target.path)),
            None => self.notify(action),
        }

        if let Err(err) = &report.refresh {
            self.report_error(err);
        }
        true
    }

    fn workspace(&self, anchor: &Path) -> Option<WorkspaceContext> {
        match WorkspaceContext::discover(anchor) {
            Ok(ctx) => {
                // Follow the repository this surface last acted on.
                *self
                    .root
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) =
                    Some(ctx.root().to_path_buf());
                Some(ctx)
            }
            Err(err) => {
                self.state.enter(ControllerState::Error(err.report()));
                self.report_error(&err);
                None
            }
        }
    }

    fn absolutize(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else if self.anchor.is_dir() {
            paths::normalize_lexically(&self.anchor.join(file))
        } else {
            let base = self.anchor.parent().unwrap_or(&self.anchor);
            paths::normalize_lexically(&base.join(file))
        }
    }

    fn report_error(&self, err: &LockError) {
        if self.is_closed() {
            tracing::debug!(error = %err, "Dropping error for closed session");
            return;
        }
        self.surface.error(&err.report());
    }

    fn notify(&self, message: &str) {
        if !self.is_closed() {
            self.surface.notice(message);
        }
    }
}

impl<A, P> Drop for SurfaceSession<A, P> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Lifecycle owner for a single-instance surface such as the detail panel.
pub struct SessionSlot<A, P> {
    session: Mutex<Option<Arc<SurfaceSession<A, P>>>>,
}

impl<A, P> Default for SessionSlot<A, P> {
    fn default() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }
}

impl<A: LockAuthority, P: FileAccess> SessionSlot<A, P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the open session, creating it with `make_surface` on first use.
    ///
    /// Callers should refresh the returned session; showing an already open
    /// panel re-fetches just like opening a new one.
    pub fn show<F>(
        &self,
        controller: &Arc<ReconciliationController<A, P>>,
        anchor: &Path,
        make_surface: F,
    ) -> Arc<SurfaceSession<A, P>>
    where
        F: FnOnce() -> Arc<dyn PresentationSurface>,
    {
        let mut slot = self.slot();
        if let Some(session) = slot.as_ref().filter(|s| !s.is_closed()) {
            return Arc::clone(session);
        }
        let session = Arc::new(SurfaceSession::open(
            Arc::clone(controller),
            make_surface(),
            anchor,
        ));
        *slot = Some(Arc::clone(&session));
        session
    }

    pub fn current(&self) -> Option<Arc<SurfaceSession<A, P>>> {
        self.slot().as_ref().filter(|s| !s.is_closed()).cloned()
    }

    /// Tears down the open session, if any.
    pub fn close(&self) {
        if let Some(session) = self.slot().take() {
            session.close();
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<SurfaceSession<A, P>>>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
