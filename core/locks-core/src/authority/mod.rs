//! Lock authority interface and the `git lfs` implementation.
//!
//! The authority is the system of record for which paths are locked and by whom.
//! The controller talks to it only through [`LockAuthority`]; output-shape quirks
//! are normalized in [`parse`] and never leak past this module.

mod git;
pub mod parse;

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::types::LockSnapshot;

pub use git::GitLfsAuthority;

/// What an unlock request releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReleaseTarget {
    /// A lock id taken from a snapshot.
    Id(String),
    /// A repository-relative path.
    Path(String),
}

impl fmt::Display for ReleaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseTarget::Id(id) => write!(f, "lock {}", id),
            ReleaseTarget::Path(path) => write!(f, "{}", path),
        }
    }
}

/// One invocation of the authority, in a form that can be both executed and
/// echoed to the user as the equivalent shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityCommand {
    Version,
    List,
    Acquire { path: String },
    Release { target: ReleaseTarget, force: bool },
}

impl AuthorityCommand {
    /// Arguments after the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["lfs".to_string()];
        match self {
            AuthorityCommand::Version => args.push("version".to_string()),
            AuthorityCommand::List => {
                args.push("locks".to_string());
                args.push("--json".to_string());
            }
            AuthorityCommand::Acquire { path } => {
                args.push("lock".to_string());
                args.push(path.clone());
            }
            AuthorityCommand::Release { target, force } => {
                args.push("unlock".to_string());
                match target {
                    ReleaseTarget::Id(id) => args.push(format!("--id={}", id)),
                    ReleaseTarget::Path(path) => args.push(path.clone()),
                }
                if *force {
                    args.push("--force".to_string());
                }
            }
        }
        args
    }

    /// Shell-visible command line. Path arguments are always quoted.
    pub fn command_line(&self, program: &str) -> String {
        // `lfs <verb> <path>`: the path, when there is one, is always third.
        let has_path = matches!(
            self,
            AuthorityCommand::Acquire { .. }
                | AuthorityCommand::Release {
                    target: ReleaseTarget::Path(_),
                    ..
                }
        );
        let rendered: Vec<String> = self
            .args()
            .into_iter()
            .enumerate()
            .map(|(index, arg)| {
                if has_path && index == 2 {
                    format!("\"{}\"", arg.replace('"', "\\\""))
                } else {
                    arg
                }
            })
            .collect();
        format!("{} {}", program, rendered.join(" "))
    }
}

/// External lock authority.
///
/// Implementors should:
/// - Report a missing or unconfigured tool from `verify_available`, so that
///   mutations never start against a misconfigured repository
/// - Return the authority's own message in `LockConflict` without rewording it
/// - Treat an empty `list` result as an empty snapshot, not an error
#[allow(async_fn_in_trait)]
pub trait LockAuthority {
    /// Program name shown in echoed command lines (e.g. "git").
    fn program(&self) -> &str;

    /// Confirms the authority is reachable for `root`.
    async fn verify_available(&self, root: &Path) -> Result<()>;

    /// Fetches the full lock set for `root`.
    async fn list_locks(&self, root: &Path) -> Result<LockSnapshot>;

    /// Locks a repository-relative path.
    async fn acquire(&self, root: &Path, path: &str) -> Result<()>;

    /// Releases a lock by id or path.
    async fn release(&self, root: &Path, target: &ReleaseTarget, force: bool) -> Result<()>;
}
