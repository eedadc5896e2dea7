//! Indirect layout references.
//!
//! Report objects (`.al` files by default) are never locked themselves. They
//! name a layout file through a `LayoutFile = '...';` style property, and that
//! layout file is what gets locked or unlocked instead.
//!
//! Three outcomes matter to the user and must stay distinct:
//!
//! - the file is not a report object: it is its own lock target
//! - the file is a report object but names no layout: [`LockError::NotRedirected`]
//! - the named layout does not exist on disk: [`LockError::ReferenceMissing`]

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{LockError, Result};
use crate::paths;
use crate::patterns::RE_LAYOUT_REFERENCE;
use crate::files::FileAccess;
use crate::types::WorkspaceContext;

/// Extracts the first non-empty layout reference from source text.
///
/// The value is returned `/`-normalized with any leading `./` removed. Existence
/// is not checked here.
pub fn resolve_indirect_reference(contents: &str) -> Option<String> {
    RE_LAYOUT_REFERENCE
        .captures_iter(contents)
        .filter_map(|caps| caps.get(2))
        .map(|value| paths::normalize_repo_path(value.as_str().trim()))
        .find(|value| !value.is_empty())
}

/// The concrete path a lock or unlock request acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockTarget {
    /// File the user pointed at.
    pub source: PathBuf,
    /// Repository-relative path handed to the authority.
    pub path: String,
    /// Layout reference text when `source` redirected to another file.
    pub reference: Option<String>,
}

impl LockTarget {
    pub fn is_redirected(&self) -> bool {
        self.reference.is_some()
    }
}

/// Determines the lock target for `file` inside `ctx`.
///
/// Files with `layout_extension` are read and redirected to their layout file,
/// which is located with [`paths::combine_paths`] against the repository root
/// and must exist on disk. Everything else targets itself.
pub async fn resolve_lock_target<P: FileAccess>(
    files: &P,
    ctx: &WorkspaceContext,
    file: &Path,
    layout_extension: &str,
) -> Result<LockTarget> {
    if !paths::has_extension(file, layout_extension) {
        let path = repo_path_within(ctx, file)?;
        return Ok(LockTarget {
            source: file.to_path_buf(),
            path,
            reference: None,
        });
    }

    let contents = files.read_to_string(file).await?;
    let Some(reference) = resolve_indirect_reference(&contents) else {
        tracing::debug!(file = %file.display(), "No layout reference found");
        return Err(LockError::NotRedirected(file.to_path_buf()));
    };

    let target = paths::combine_paths(ctx.root(), &reference);
    if !files.exists(&target).await {
        return Err(LockError::ReferenceMissing {
            source_file: file.to_path_buf(),
            reference,
            target,
        });
    }

    let path = repo_path_within(ctx, &target)?;
    tracing::debug!(
        file = %file.display(),
        reference = %reference,
        target = %path,
        "Resolved layout reference"
    );
    Ok(LockTarget {
        source: file.to_path_buf(),
        path,
        reference: Some(reference),
    })
}

fn repo_path_within(ctx: &WorkspaceContext, absolute: &Path) -> Result<String> {
    let relative = ctx.relative(absolute)?;
    if paths::is_within_root(&relative) {
        Ok(relative)
    } else {
        Err(LockError::PathDomain {
            root: ctx.root().to_path_buf(),
            path: absolute.to_path_buf(),
            reason: "path is outside the repository".to_string(),
        })
    }
}
