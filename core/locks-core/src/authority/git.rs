//! `git lfs` as the lock authority.
//!
//! Every call runs `git lfs <verb>` in the repository root. Non-zero exits are
//! classified per verb: `version` → unavailable, `lock`/`unlock` → conflict
//! (authority message passed through verbatim), `locks` → command failure.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;

use super::parse::parse_lock_list;
use super::{AuthorityCommand, LockAuthority, ReleaseTarget};
use crate::error::{LockError, Result};
use crate::types::LockSnapshot;

const DEFAULT_PROGRAM: &str = "git";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct GitLfsAuthority {
    program: String,
    timeout: Duration,
}

impl Default for GitLfsAuthority {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl GitLfsAuthority {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, root: &Path, command: &AuthorityCommand) -> Result<Output> {
        let line = command.command_line(&self.program);
        tracing::debug!(root = %root.display(), command = %line, "Running lock authority");

        let child = Command::new(&self.program)
            .args(command.args())
            .current_dir(root)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) if err.kind() == ErrorKind::NotFound => {
                Err(LockError::AuthorityUnavailable {
                    message: format!("'{}' was not found on PATH", self.program),
                })
            }
            Ok(Err(err)) => Err(LockError::io(format!("running {}", line), err)),
            Err(_) => Err(LockError::CommandFailed {
                command: line,
                details: format!("timed out after {}s", self.timeout.as_secs()),
            }),
        }
    }
}

impl LockAuthority for GitLfsAuthority {
    fn program(&self) -> &str {
        &self.program
    }

    async fn verify_available(&self, root: &Path) -> Result<()> {
        let output = self.run(root, &AuthorityCommand::Version).await?;
        if output.status.success() {
            return Ok(());
        }
        Err(LockError::AuthorityUnavailable {
            message: format!(
                "{} (run \"{} lfs install\" in the repository root)",
                failure_message(&output),
                self.program
            ),
        })
    }

    async fn list_locks(&self, root: &Path) -> Result<LockSnapshot> {
        let command = AuthorityCommand::List;
        let output = self.run(root, &command).await?;
        if !output.status.success() {
            return Err(LockError::CommandFailed {
                command: command.command_line(&self.program),
                details: failure_message(&output),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = parse_lock_list(&stdout)?;
        tracing::debug!(count = records.len(), "Parsed lock list");
        Ok(LockSnapshot::fetched(root, records))
    }

    async fn acquire(&self, root: &Path, path: &str) -> Result<()> {
        let command = AuthorityCommand::Acquire {
            path: path.to_string(),
        };
        let output = self.run(root, &command).await?;
        conflict_on_failure(&output)
    }

    async fn release(&self, root: &Path, target: &ReleaseTarget, force: bool) -> Result<()> {
        let command = AuthorityCommand::Release {
            target: target.clone(),
            force,
        };
        let output = self.run(root, &command).await?;
        conflict_on_failure(&output)
    }
}

fn conflict_on_failure(output: &Output) -> Result<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(LockError::LockConflict {
            message: failure_message(output),
        })
    }
}

/// Prefers stderr, falls back to stdout, then to the exit status.
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let message = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("exited with {}", output.status));
    message
}
