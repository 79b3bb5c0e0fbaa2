//! Path and entry-type checks applied before anything is written to disk.
//!
//! Archive member names are attacker-controlled. Every path is normalized and
//! confined to the output directory before extraction touches the filesystem.

use crate::entry::EntryType;
use crate::error::SecurityError;
use crate::types::ExtractOptions;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Validates and normalizes an archive entry path.
///
/// Absolute paths and any `..` component are rejected; `.` components and
/// redundant separators are dropped. A path that normalizes to nothing (such
/// as `.` or `./`) is rejected as well.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use archive_stream::safety::validate_entry_path;
///
/// let safe_path = validate_entry_path(Path::new("./dir//file.txt")).unwrap();
/// assert_eq!(safe_path, Path::new("dir/file.txt"));
///
/// assert!(validate_entry_path(Path::new("../../etc/passwd")).is_err());
/// assert!(validate_entry_path(Path::new("/etc/passwd")).is_err());
/// ```
pub fn validate_entry_path(path: &Path) -> Result<PathBuf, SecurityError> {
    if path.is_absolute() {
        return Err(SecurityError::AbsolutePath(path.display().to_string()));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => continue,
            Component::ParentDir => {
                return Err(SecurityError::PathTraversal(format!(
                    "Path contains '..' component: {}",
                    path.display()
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SecurityError::AbsolutePath(path.display().to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(SecurityError::PathTraversal(format!(
            "Path normalizes to empty: {}",
            path.display()
        )));
    }

    Ok(normalized)
}

/// Strip leading path components from a path.
pub fn strip_path_components(path: &Path, count: u32) -> PathBuf {
    path.components().skip(count as usize).collect()
}

/// Whether an entry of this type may be materialized under `options`.
///
/// Files, directories and hardlinks (whose targets are confined to the output
/// directory) are allowed. Symlinks need `allow_symlinks`; device nodes,
/// sockets and pipes are never created.
pub fn is_safe_entry_type(entry_type: EntryType, options: &ExtractOptions) -> bool {
    match entry_type {
        EntryType::File | EntryType::Directory | EntryType::Hardlink => true,
        EntryType::Symlink => options.allow_symlinks,
        EntryType::Other => false,
    }
}

/// Whether an existing component of `root.join(relative)`, short of the last
/// one, is a symlink.
///
/// Creating anything below such a component would follow the link, possibly
/// out of `root`. Only the part of the path that already exists is checked.
pub fn has_symlink_ancestor(root: &Path, relative: &Path) -> bool {
    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

/// Checks that a symlink created at `link` (relative to `root`) and pointing
/// at `target` resolves inside `root`, given what is already on disk.
///
/// Walking the target, a `..` may only step out of an existing real directory,
/// and only the final component may be an existing symlink. Links through
/// links and `..` over not-yet-created components are rejected, so a chain of
/// members cannot climb out of `root`.
pub fn validate_symlink_target(
    root: &Path,
    link: &Path,
    target: &Path,
) -> Result<(), SecurityError> {
    if target.is_absolute() {
        return Err(SecurityError::AbsolutePath(target.display().to_string()));
    }

    let escapes = || {
        SecurityError::PathTraversal(format!(
            "Symlink escapes output directory: {} -> {}",
            link.display(),
            target.display()
        ))
    };

    // Directory holding the link, relative to the root.
    let mut resolved: Vec<&OsStr> = link
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    resolved.pop();

    let mut components = target.components().peekable();
    while let Some(component) = components.next() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                let is_last = components.peek().is_none();
                let on_disk: PathBuf = root.join(resolved.iter().collect::<PathBuf>());
                let is_symlink = fs::symlink_metadata(&on_disk)
                    .map(|meta| meta.file_type().is_symlink())
                    .unwrap_or(false);
                if is_symlink && !is_last {
                    return Err(escapes());
                }
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let on_disk: PathBuf = root.join(resolved.iter().collect::<PathBuf>());
                let is_real_dir = fs::symlink_metadata(&on_disk)
                    .map(|meta| meta.is_dir())
                    .unwrap_or(false);
                if resolved.pop().is_none() || !is_real_dir {
                    return Err(escapes());
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SecurityError::AbsolutePath(target.display().to_string()));
            }
        }
    }
    Ok(())
}
