//! Path conversions between the three path spaces the locker deals with:
//! absolute filesystem paths, repository-relative paths (always `/`-separated,
//! which is what `git lfs` expects on every platform), and paths rendered in a
//! lock list that may already repeat the tail of the repository root.
//!
//! Everything here is lexical. No function touches the filesystem, so results
//! do not depend on whether the path exists.

use std::path::{Component, Path, PathBuf};

use crate::error::{LockError, Result};

/// Computes the path of `absolute` relative to `root`, `/`-separated.
///
/// Both inputs must be absolute and share a prefix (same drive on Windows),
/// otherwise the paths are not comparable and a `PathDomain` error is returned.
/// Paths outside `root` produce leading `..` segments; use [`is_within_root`]
/// when the caller needs the result to stay inside the repository.
///
/// # Examples
///
/// ```ignore
/// to_repo_relative("/repo", "/repo/layouts/invoice.rdl") -> "layouts/invoice.rdl"
/// to_repo_relative("/repo", "/repo") -> ""
/// to_repo_relative("/repo/src", "/repo/docs/a.md") -> "../docs/a.md"
/// ```
pub fn to_repo_relative(root: &Path, absolute: &Path) -> Result<String> {
    let domain_error = |reason: &str| LockError::PathDomain {
        root: root.to_path_buf(),
        path: absolute.to_path_buf(),
        reason: reason.to_string(),
    };

    if !root.is_absolute() {
        return Err(domain_error("repository root is not absolute"));
    }
    if !absolute.is_absolute() {
        return Err(domain_error("path is not absolute"));
    }

    let root = normalize_lexically(root);
    let absolute = normalize_lexically(absolute);

    if path_prefix(&root) != path_prefix(&absolute) {
        return Err(domain_error("paths have no common root"));
    }

    let root_segments = segments(&root);
    let path_segments = segments(&absolute);
    let common = root_segments
        .iter()
        .zip(&path_segments)
        .take_while(|(a, b)| a == b)
        .count();

    let relative: Vec<String> = std::iter::repeat("..".to_string())
        .take(root_segments.len() - common)
        .chain(path_segments[common..].iter().cloned())
        .collect();

    Ok(normalize_repo_path(&relative.join("/")))
}

/// Joins a repository-relative path onto `root`.
///
/// Accepts either separator and resolves `.`/`..` lexically, so it is the
/// inverse of [`to_repo_relative`] for any path that stays within the root.
pub fn to_absolute(root: &Path, relative: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    for segment in split_segments(relative) {
        joined.push(segment);
    }
    normalize_lexically(&joined)
}

/// True when a repository-relative path does not escape the root.
pub fn is_within_root(relative: &str) -> bool {
    !relative.is_empty() && relative != ".." && !relative.starts_with("../")
}

/// Combines `base` with `supplied`, collapsing overlapping segments.
///
/// Finds the longest suffix of `base`'s segments that equals a prefix of
/// `supplied`'s segments and appends only the remainder. Without overlap this is
/// a plain join.
///
/// ```ignore
/// combine_paths("/a/b/c", "b/c/d/x.txt") -> "/a/b/c/d/x.txt"
/// combine_paths("/a/b/c", "d/x.txt")     -> "/a/b/c/d/x.txt"
/// ```
pub fn combine_paths(base: &Path, supplied: &str) -> PathBuf {
    let base = normalize_lexically(base);
    let base_segments = segments(&base);
    let supplied_segments = split_segments(supplied);

    let max_overlap = base_segments.len().min(supplied_segments.len());
    let overlap = (1..=max_overlap)
        .rev()
        .find(|&k| {
            base_segments[base_segments.len() - k..]
                .iter()
                .zip(&supplied_segments[..k])
                .all(|(a, b)| a == b)
        })
        .unwrap_or(0);

    if overlap > 0 {
        tracing::debug!(
            base = %base.display(),
            supplied,
            overlap,
            "Collapsed overlapping path segments"
        );
    }

    let mut combined = base;
    for segment in &supplied_segments[overlap..] {
        combined.push(segment);
    }
    normalize_lexically(&combined)
}

/// Normalizes a repository path: `/` separators, no `./` prefix, no trailing slash.
pub fn normalize_repo_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let mut trimmed = forward.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Resolves `.` and `..` components without consulting the filesystem.
/// `..` never climbs above the root of an absolute path.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                let ends_in_parent =
                    matches!(normalized.components().next_back(), Some(Component::ParentDir));
                if at_root && path.is_absolute() {
                    continue;
                }
                if at_root || ends_in_parent {
                    normalized.push("..");
                } else {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// True when `path` has `extension`, compared case-insensitively.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// Last path segment, or the whole path when there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn path_prefix(path: &Path) -> Option<Component<'_>> {
    match path.components().next() {
        Some(prefix @ Component::Prefix(_)) => Some(prefix),
        _ => None,
    }
}

fn segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().to_string()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect()
}

fn split_segments(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_string)
        .collect()
}
