//! Archive extraction on top of the streaming reader.

use crate::entry::{Entry, EntryType, FileMode};
use crate::error::{ArchiveError, Result};
use crate::probe::unwrap_archive_error;
use crate::reader::Reader;
use crate::safety::{
    has_symlink_ancestor, is_safe_entry_type, strip_path_components, validate_entry_path,
    validate_symlink_target,
};
use crate::types::{ExtractOptions, ExtractStats, OverwriteMode};
use crate::with_reader_options;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Extract every member of the archive in `source` below `output_dir`.
///
/// Members are streamed straight from the reader to disk:
/// - entry paths are normalized and confined to `output_dir`; offending
///   members are skipped with a warning
/// - `strip_components` leading components are removed, and members whose
///   path becomes empty are skipped
/// - nothing is created below an existing symlink
/// - symlinks are only created with `allow_symlinks`, and only when their
///   target stays inside `output_dir`
/// - hardlinks are created against an already extracted regular file
/// - device nodes, sockets and pipes are skipped
///
/// A raw (non-archive) stream is written as a single file, named by
/// `options.raw_name` when set.
///
/// # Errors
///
/// Returns the first reader error other than end of archive, or the first
/// filesystem error.
pub fn extract_archive<R: Read>(
    source: R,
    output_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractStats> {
    let start_time = Instant::now();
    fs::create_dir_all(output_dir)?;

    let mut stats = ExtractStats::default();
    with_reader_options(source, options.reader, |reader| {
        loop {
            let entry = match reader.next_entry() {
                Ok(entry) => entry,
                Err(ArchiveError::ArchiveEof) => break,
                Err(e) => return Err(e),
            };
            extract_entry(reader, &entry, output_dir, options, &mut stats)?;
        }
        Ok(())
    })?;

    stats.duration = start_time.elapsed();
    tracing::info!(
        files = stats.files_extracted,
        directories = stats.directories_created,
        links = stats.links_created,
        skipped = stats.entries_skipped,
        bytes = stats.bytes_written,
        "extraction finished"
    );
    Ok(stats)
}

fn extract_entry<R>(
    reader: &mut Reader<R>,
    entry: &Entry,
    output_dir: &Path,
    options: &ExtractOptions,
    stats: &mut ExtractStats,
) -> Result<()> {
    let name = match (reader.is_raw(), &options.raw_name) {
        (true, Some(raw_name)) => raw_name.as_path(),
        _ => Path::new(entry.path_name()),
    };
    let Some(relative) = output_relative_path(name, options.strip_components) else {
        stats.entries_skipped += 1;
        return Ok(());
    };

    let entry_type = entry.entry_type();
    if !is_safe_entry_type(entry_type, options) {
        tracing::debug!(path = entry.path_name(), ?entry_type, "skipping entry type");
        stats.entries_skipped += 1;
        return Ok(());
    }

    // Anything below an existing symlink would be created wherever it points.
    if has_symlink_ancestor(output_dir, &relative) {
        tracing::warn!(path = entry.path_name(), "skipping entry below a symlink");
        stats.entries_skipped += 1;
        return Ok(());
    }

    let output_path = output_dir.join(&relative);
    if entry_type == EntryType::Directory {
        fs::create_dir_all(&output_path)?;
        stats.directories_created += 1;
        return Ok(());
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Link targets are checked before an existing destination is touched.
    let mut hardlink_source = None;
    match entry_type {
        EntryType::Symlink => {
            let target = Path::new(entry.symlink());
            if let Err(e) = validate_symlink_target(output_dir, &relative, target) {
                tracing::warn!(path = entry.path_name(), error = %e, "skipping symlink");
                stats.entries_skipped += 1;
                return Ok(());
            }
        }
        EntryType::Hardlink => {
            let Some(source) = resolve_hardlink_source(entry, output_dir, options) else {
                stats.entries_skipped += 1;
                return Ok(());
            };
            hardlink_source = Some(source);
        }
        _ => {}
    }

    let Some(dest) = resolve_conflict(&output_path, options.overwrite)? else {
        stats.entries_skipped += 1;
        return Ok(());
    };

    match (entry_type, hardlink_source) {
        (EntryType::File, _) => {
            let written = write_file(reader, &dest, entry.metadata().mode())?;
            stats.files_extracted += 1;
            stats.bytes_written += written;
        }
        (EntryType::Symlink, _) => {
            if create_symlink(Path::new(entry.symlink()), &dest)? {
                stats.links_created += 1;
            } else {
                stats.entries_skipped += 1;
            }
        }
        (EntryType::Hardlink, Some(source)) => {
            fs::hard_link(&source, &dest)?;
            stats.links_created += 1;
        }
        _ => {}
    }
    Ok(())
}

/// The already extracted regular file a hardlink member refers to, if it is
/// inside `output_dir` and reachable without following symlinks.
fn resolve_hardlink_source(
    entry: &Entry,
    output_dir: &Path,
    options: &ExtractOptions,
) -> Option<PathBuf> {
    let relative = output_relative_path(Path::new(entry.hardlink()), options.strip_components)?;
    let source = output_dir.join(&relative);
    let is_regular_file = !has_symlink_ancestor(output_dir, &relative)
        && fs::symlink_metadata(&source)
            .map(|meta| meta.is_file())
            .unwrap_or(false);

    if !is_regular_file {
        tracing::warn!(
            path = entry.path_name(),
            target = entry.hardlink(),
            "hardlink target is not an extracted regular file, skipping"
        );
        return None;
    }
    Some(source)
}

/// Normalizes an archive path and strips leading components. `None` means the
/// member should be skipped.
fn output_relative_path(path: &Path, strip_components: u32) -> Option<PathBuf> {
    let validated = match validate_entry_path(path) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unsafe entry path");
            return None;
        }
    };
    let stripped = strip_path_components(&validated, strip_components);
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Streams the current member's content into a new file at `dest`.
fn write_file<R>(reader: &mut Reader<R>, dest: &Path, mode: FileMode) -> Result<u64> {
    let mut file = File::create(dest)?;
    let written = io::copy(reader, &mut file).map_err(unwrap_archive_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode.permissions()))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(written)
}

#[cfg(unix)]
fn create_symlink(target: &Path, dest: &Path) -> Result<bool> {
    std::os::unix::fs::symlink(target, dest)?;
    Ok(true)
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, dest: &Path) -> Result<bool> {
    tracing::warn!(
        link = %dest.display(),
        target = %target.display(),
        "symlinks are not supported on this platform, skipping"
    );
    Ok(false)
}

/// Picks the destination for a member that would land on `path`, following
/// the overwrite mode. `None` means skip the member.
fn resolve_conflict(path: &Path, mode: OverwriteMode) -> Result<Option<PathBuf>> {
    // symlink_metadata so that an existing symlink is never followed
    let Ok(existing) = fs::symlink_metadata(path) else {
        return Ok(Some(path.to_path_buf()));
    };

    match mode {
        OverwriteMode::Skip => Ok(None),
        OverwriteMode::Replace => {
            if existing.is_dir() {
                return Err(ArchiveError::Io(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("refusing to replace directory {}", path.display()),
                )));
            }
            fs::remove_file(path)?;
            Ok(Some(path.to_path_buf()))
        }
        OverwriteMode::Rename => {
            let parent = path.parent().unwrap_or(Path::new(""));
            let file_stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
            let extension = path.extension().and_then(|s| s.to_str());

            for i in 1..1000 {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", file_stem, i, ext),
                    None => format!("{} ({})", file_stem, i),
                };
                let new_path = parent.join(new_name);
                if fs::symlink_metadata(&new_path).is_err() {
                    return Ok(Some(new_path));
                }
            }

            Err(ArchiveError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Could not find unique filename",
            )))
        }
    }
}
