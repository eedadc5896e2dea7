//! Core lock types shared by the controller, the store and every surface.
//!
//! Records are immutable once built. A snapshot is replaced wholesale on the
//! next successful fetch; nothing in here is ever patched in place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::{LockError, Result};
use crate::paths;

// ═══════════════════════════════════════════════════════════════════════════════
// Lock Records
// ═══════════════════════════════════════════════════════════════════════════════

/// One active lock as reported by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockRecord {
    id: String,
    path: String,
    owner_name: String,
    locked_at: String,
}

impl LockRecord {
    /// Builds a record, normalizing `path` to forward slashes.
    pub fn new(
        id: impl Into<String>,
        path: &str,
        owner_name: impl Into<String>,
        locked_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: paths::normalize_repo_path(path),
            owner_name: owner_name.into(),
            locked_at: locked_at.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Repository-relative path with `/` separators.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Raw authority timestamp. Never re-validated.
    pub fn locked_at(&self) -> &str {
        &self.locked_at
    }

    /// Local-time rendering of `locked_at`, or the raw value when it does not parse.
    pub fn display_locked_at(&self) -> String {
        DateTime::parse_from_rfc3339(&self.locked_at)
            .map(|at| {
                at.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|_| self.locked_at.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshots
// ═══════════════════════════════════════════════════════════════════════════════

/// The full, versioned set of currently known locks for one repository.
///
/// Record order is the authority's reporting order. Ids and paths are unique
/// within a snapshot; the parser rejects payloads that violate this.
#[derive(Debug, Clone, Serialize)]
pub struct LockSnapshot {
    version: u64,
    fetched_at: Option<DateTime<Utc>>,
    root: Option<PathBuf>,
    records: Vec<LockRecord>,
}

impl LockSnapshot {
    /// The initial, never-fetched snapshot (version 0).
    pub fn empty() -> Self {
        Self {
            version: 0,
            fetched_at: None,
            root: None,
            records: Vec::new(),
        }
    }

    /// A freshly fetched snapshot. The version is assigned by the store on swap.
    pub fn fetched(root: &Path, records: Vec<LockRecord>) -> Self {
        Self {
            version: 0,
            fetched_at: Some(Utc::now()),
            root: Some(root.to_path_buf()),
            records,
        }
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Repository root this snapshot was fetched for (`None` before the first fetch).
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn records(&self) -> &[LockRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&LockRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn find_by_path(&self, path: &str) -> Option<&LockRecord> {
        let normalized = paths::normalize_repo_path(path);
        self.records.iter().find(|r| r.path == normalized)
    }
}

impl Default for LockSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Workspace Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Repository root resolved for a single operation.
///
/// Deliberately not cached: the anchor's repository can change between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceContext {
    root: PathBuf,
}

impl WorkspaceContext {
    /// Uses `root` as-is. Callers must pass an absolute repository root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Finds the nearest ancestor of `anchor` (inclusive) that contains `.git`.
    pub fn discover(anchor: &Path) -> Result<Self> {
        let start = paths::normalize_lexically(anchor);
        start
            .ancestors()
            .find(|dir| dir.join(".git").exists())
            .map(|dir| Self::new(dir))
            .ok_or_else(|| LockError::WorkspaceNotFound(anchor.to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn relative(&self, absolute: &Path) -> Result<String> {
        paths::to_repo_relative(&self.root, absolute)
    }
}
