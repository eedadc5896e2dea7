//! # lfs-locks-core
//!
//! Lock reconciliation and path resolution for Git LFS file locking, shared by
//! every front end (CLI table, tree view, watch mode).
//!
//! ## Design Principles
//!
//! - **Authority is always right**: the lock set is fetched whole and swapped in
//!   whole. There is no optimistic local state and no merging.
//! - **One store, many surfaces**: every surface renders from the same
//!   [`LockStateStore`] and is notified on each swap.
//! - **Async at the edges**: process invocations and file reads are awaited;
//!   the store itself is synchronous.
//! - **Failures stay local**: errors are returned to the surface that asked and
//!   never clear the shared snapshot.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lfs_locks_core::{DiskFiles, GitLfsAuthority, LockStateStore, ReconciliationController};
//!
//! let controller = ReconciliationController::new(
//!     GitLfsAuthority::default(),
//!     DiskFiles,
//!     LockStateStore::new(),
//! );
//! let snapshot = controller.refresh(repo_root).await?;
//! ```

pub mod authority;
pub mod config;
pub mod controller;
pub mod error;
pub mod files;
pub mod paths;
pub mod patterns;
pub mod reference;
pub mod session;
pub mod store;
pub mod types;

pub use authority::{AuthorityCommand, GitLfsAuthority, LockAuthority, ReleaseTarget};
pub use config::{load_config, LockerConfig};
pub use controller::{ControllerState, MutationReport, PhaseObserver, ReconciliationController};
pub use error::{LockError, Result};
pub use files::{DiskFiles, FileAccess};
pub use reference::{resolve_indirect_reference, resolve_lock_target, LockTarget};
pub use session::{PresentationSurface, SessionSlot, SurfaceOutcome, SurfaceRequest, SurfaceSession};
pub use store::{LockStateStore, Subscription};
pub use types::{LockRecord, LockSnapshot, WorkspaceContext};
