//! Common test utilities: an in-memory lock authority, in-memory files
//! and a surface that records what it was shown.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lfs_locks_core::{
    ControllerState, FileAccess, LockAuthority, LockError, LockRecord, LockSnapshot,
    PhaseObserver, PresentationSurface, ReleaseTarget, Result,
};

// ============================================================================
// Authority
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub version: usize,
    pub list: usize,
    pub acquire: usize,
    pub release: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.version + self.list + self.acquire + self.release
    }
}

#[derive(Debug)]
struct AuthorityState {
    locks: Vec<LockRecord>,
    next_id: u64,
    available: bool,
    fail_list: bool,
    calls: CallCounts,
}

/// Scripted lock authority.
///
/// `list` takes its copy of the lock set before sleeping, so a list that
/// overlaps a mutation reports the pre-mutation state, like a slow server would.
#[derive(Debug, Clone)]
pub struct FakeAuthority {
    state: Arc<Mutex<AuthorityState>>,
    list_delay: Duration,
    mutation_delay: Duration,
}

impl Default for FakeAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAuthority {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AuthorityState {
                locks: Vec::new(),
                next_id: 1,
                available: true,
                fail_list: false,
                calls: CallCounts::default(),
            })),
            list_delay: Duration::from_millis(20),
            mutation_delay: Duration::from_millis(10),
        }
    }

    /// Adds a lock directly, bypassing the call counters. Returns its id.
    pub fn seed(&self, path: &str, owner: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id.to_string();
        state.next_id += 1;
        state
            .locks
            .push(LockRecord::new(id.clone(), path, owner, "2024-03-01T10:00:00Z"));
        id
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unwrap().available = available;
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    pub fn locked_paths(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .locks
            .iter()
            .map(|r| r.path().to_string())
            .collect()
    }
}

impl LockAuthority for FakeAuthority {
    fn program(&self) -> &str {
        "git"
    }

    async fn verify_available(&self, _root: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.version += 1;
        if state.available {
            Ok(())
        } else {
            Err(LockError::AuthorityUnavailable {
                message: "git: 'lfs' is not a git command".to_string(),
            })
        }
    }

    async fn list_locks(&self, root: &Path) -> Result<LockSnapshot> {
        let (records, fail) = {
            let mut state = self.state.lock().unwrap();
            state.calls.list += 1;
            (state.locks.clone(), state.fail_list)
        };
        tokio::time::sleep(self.list_delay).await;
        if fail {
            return Err(LockError::CommandFailed {
                command: "git lfs locks --json".to_string(),
                details: "connection reset".to_string(),
            });
        }
        Ok(LockSnapshot::fetched(root, records))
    }

    async fn acquire(&self, _root: &Path, path: &str) -> Result<()> {
        self.state.lock().unwrap().calls.acquire += 1;
        tokio::time::sleep(self.mutation_delay).await;

        let mut state = self.state.lock().unwrap();
        if state.locks.iter().any(|r| r.path() == path) {
            return Err(LockError::LockConflict {
                message: "Lock exists".to_string(),
            });
        }
        let id = state.next_id.to_string();
        state.next_id += 1;
        state
            .locks
            .push(LockRecord::new(id, path, "me", "2024-03-02T09:30:00Z"));
        Ok(())
    }

    async fn release(&self, _root: &Path, target: &ReleaseTarget, _force: bool) -> Result<()> {
        self.state.lock().unwrap().calls.release += 1;
        tokio::time::sleep(self.mutation_delay).await;

        let mut state = self.state.lock().unwrap();
        let before = state.locks.len();
        state.locks.retain(|r| match target {
            ReleaseTarget::Id(id) => r.id() != id,
            ReleaseTarget::Path(path) => r.path() != path,
        });
        if state.locks.len() == before {
            return Err(LockError::LockConflict {
                message: format!("Unable to find lock for {}", target),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Files
// ============================================================================

/// In-memory files keyed by absolute path.
#[derive(Debug, Default, Clone)]
pub struct MemoryFiles {
    files: HashMap<PathBuf, String>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.insert(path.into(), contents.to_string());
        self
    }
}

impl FileAccess for MemoryFiles {
    async fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            LockError::io(
                format!("reading {}", path.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
        })
    }
}

// ============================================================================
// Observers and Surfaces
// ============================================================================

/// Records every state a request passes through.
#[derive(Debug, Default)]
pub struct PhaseLog {
    states: Mutex<Vec<ControllerState>>,
}

impl PhaseLog {
    pub fn states(&self) -> Vec<ControllerState> {
        self.states.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ControllerState> {
        self.states.lock().unwrap().last().cloned()
    }
}

impl PhaseObserver for PhaseLog {
    fn enter(&self, state: ControllerState) {
        self.states.lock().unwrap().push(state);
    }
}

/// Surface that remembers every update, error and notice.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    versions: Mutex<Vec<u64>>,
    paths: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn versions(&self) -> Vec<u64> {
        self.versions.lock().unwrap().clone()
    }

    /// Paths from the most recent update.
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl PresentationSurface for RecordingSurface {
    fn update(&self, snapshot: &LockSnapshot) {
        self.versions.lock().unwrap().push(snapshot.version());
        *self.paths.lock().unwrap() = snapshot
            .records()
            .iter()
            .map(|r| r.path().to_string())
            .collect();
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

// ============================================================================
// Workspaces
// ============================================================================

/// A temporary repository: `<temp>/repo` with a `.git` directory.
pub fn temp_repo() -> (tempfile::TempDir, PathBuf) {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");
    let root = temp.path().join("repo");
    std::fs::create_dir_all(root.join(".git")).expect("Failed to create .git");
    (temp, root)
}

/// Writes `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(&path, contents).expect("Failed to write file");
    path
}
