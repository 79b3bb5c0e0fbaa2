//! Archive listing: walk every member once and record what was found.

use crate::entry::EntryType;
use crate::error::{ArchiveError, Result};
use crate::reader::Reader;
use crate::types::{ArchiveListing, ListedEntry, ReaderOptions};
use crate::with_reader_options;
use std::io::{self, Read};

/// List every member of the archive in `source`.
///
/// Each member's content is drained so that `size` reports the bytes actually
/// delivered rather than the declared size, which some formats misreport for
/// links.
///
/// # Errors
///
/// Returns the first error from opening, advancing or reading. End of
/// archive is not an error.
pub fn list_entries<R: Read>(source: R) -> Result<ArchiveListing> {
    list_entries_with(source, ReaderOptions::default())
}

/// [`list_entries`] with explicit reader options.
pub fn list_entries_with<R: Read>(source: R, options: ReaderOptions) -> Result<ArchiveListing> {
    with_reader_options(source, options, |reader| {
        let mut entries = Vec::new();
        let mut format = None;
        let mut raw = false;

        loop {
            let entry = match reader.next_entry() {
                Ok(entry) => entry,
                Err(ArchiveError::ArchiveEof) => break,
                Err(e) => return Err(e),
            };
            if format.is_none() {
                format = reader.format_name();
                raw = reader.is_raw();
            }

            let size = drain(reader)?;
            let entry_type = entry.entry_type();
            let link_target = match entry_type {
                EntryType::Symlink => Some(entry.symlink().to_string()),
                EntryType::Hardlink => Some(entry.hardlink().to_string()),
                _ => None,
            };

            entries.push(ListedEntry {
                path: entry.path_name().to_string(),
                entry_type,
                size,
                mode: entry.metadata().mode(),
                link_target,
            });
        }

        tracing::debug!(entries = entries.len(), "archive listed");
        Ok(ArchiveListing {
            format: format.unwrap_or_default(),
            filters: reader.filter_names(),
            raw,
            entries,
        })
    })
}

/// Reads the current member to its end, returning the byte count.
fn drain<R>(reader: &mut Reader<R>) -> Result<u64> {
    io::copy(reader, &mut io::sink()).map_err(unwrap_archive_error)
}

/// Recovers the archive error carried inside an `io::Error` produced by the
/// reader's `Read` implementation.
pub(crate) fn unwrap_archive_error(err: io::Error) -> ArchiveError {
    if err.get_ref().is_some_and(|inner| inner.is::<ArchiveError>()) {
        match err.into_inner().map(|inner| inner.downcast::<ArchiveError>()) {
            Some(Ok(archive_err)) => *archive_err,
            _ => ArchiveError::Failed("error lost while unwrapping".to_string()),
        }
    } else {
        ArchiveError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_archive_error_round_trips_kind() {
        let io_err: io::Error = ArchiveError::InvalidHeaderSignature.into();
        assert!(matches!(
            unwrap_archive_error(io_err),
            ArchiveError::InvalidHeaderSignature
        ));
    }

    #[test]
    fn test_unwrap_archive_error_keeps_plain_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        match unwrap_archive_error(io_err) {
            ArchiveError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
