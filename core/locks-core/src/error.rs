//! Error types for lfs-locks-core operations.
//! Every variant is recovered at the session boundary and shown to the user;
//! none of them should tear down a session.

use std::path::PathBuf;
use std::sync::Arc;

/// All errors that can occur while resolving paths or talking to the lock authority.
///
/// `Clone` because a coalesced refresh hands the same outcome to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LockError {
    // ─────────────────────────────────────────────────────────────────────
    // Authority Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Git LFS is not available for this repository: {message}")]
    AuthorityUnavailable { message: String },

    #[error("Unexpected lock authority output: {details}")]
    Parse { details: String, raw: String },

    #[error("Lock request rejected: {message}")]
    LockConflict { message: String },

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Path Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Cannot resolve {} against {}: {reason}", .path.display(), .root.display())]
    PathDomain {
        root: PathBuf,
        path: PathBuf,
        reason: String,
    },

    #[error(
        "Layout reference '{reference}' in {} points to a missing file: {}",
        .source_file.display(),
        .target.display()
    )]
    ReferenceMissing {
        source_file: PathBuf,
        reference: String,
        target: PathBuf,
    },

    #[error("{} has no layout reference; only its layout file can be locked", .0.display())]
    NotRedirected(PathBuf),

    #[error("{} is not part of a Git repository", .0.display())]
    WorkspaceNotFound(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl LockError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        LockError::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// User-facing text for a surface. Parse failures carry the raw payload
    /// so the user can see what the authority actually printed.
    pub fn report(&self) -> String {
        match self {
            LockError::Parse { raw, .. } if !raw.trim().is_empty() => {
                format!("{}\n--- raw output ---\n{}", self, raw.trim_end())
            }
            _ => self.to_string(),
        }
    }
}

/// Convenience type alias for Results using LockError.
pub type Result<T> = std::result::Result<T, LockError>;
