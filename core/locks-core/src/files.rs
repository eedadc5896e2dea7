//! Filesystem access used by path resolution.
//!
//! Kept behind a trait so tests can resolve references against in-memory files.

use std::path::Path;

use crate::error::{LockError, Result};

/// Existence checks and content reads. Both are suspension points.
#[allow(async_fn_in_trait)]
pub trait FileAccess {
    /// True when `path` exists. Errors count as "does not exist".
    async fn exists(&self, path: &Path) -> bool;

    /// Reads a UTF-8 text file.
    async fn read_to_string(&self, path: &Path) -> Result<String>;
}

/// [`FileAccess`] backed by the real filesystem through `fs_err::tokio`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFiles;

impl FileAccess for DiskFiles {
    async fn exists(&self, path: &Path) -> bool {
        fs_err::tokio::metadata(path).await.is_ok()
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        fs_err::tokio::read_to_string(path)
            .await
            .map_err(|e| LockError::io(format!("reading {}", path.display()), e))
    }
}
