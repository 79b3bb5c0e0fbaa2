//! # archive-stream
//!
//! Streaming, pull-based archive reading on top of the native libarchive
//! engine.
//!
//! libarchive does the format sniffing, decompression and header parsing.
//! This crate feeds it from any [`std::io::Read`] through a single reusable
//! buffer and exposes the result as a reader that walks archive members one
//! header at a time and reads each member's content.
//!
//! ## Supported Inputs
//!
//! Everything libarchive reads: tar, cpio, ar, ISO 9660, zip, 7-Zip and more,
//! behind any supported filter (gzip, bzip2, xz, zstd, ...). A compressed
//! stream with no archive inside is read as a single raw member, see
//! [`Reader::is_raw`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use archive_stream::{with_reader, ArchiveError};
//! use std::fs::File;
//! use std::io::Read;
//!
//! # fn main() -> Result<(), ArchiveError> {
//! let file = File::open("archive.tar.gz")?;
//! with_reader(file, |reader| {
//!     loop {
//!         let entry = match reader.next_entry() {
//!             Ok(entry) => entry,
//!             Err(e) if e.is_eof() => break,
//!             Err(e) => return Err(e),
//!         };
//!         let mut content = Vec::new();
//!         reader.read_to_end(&mut content)?;
//!         println!("{} ({} bytes)", entry.path_name(), content.len());
//!     }
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

mod bridge;
pub mod entry;
pub mod error;
pub mod extract;
mod ffi;
pub mod probe;
mod reader;
pub mod safety;
pub mod types;

// Re-export main types
pub use entry::{Entry, EntryMetadata, EntryType, FileMode};
pub use error::{ArchiveError, Result, SecurityError};
pub use extract::extract_archive;
pub use probe::{list_entries, list_entries_with};
pub use reader::{Entries, Reader};
pub use types::{
    ArchiveListing, ExtractOptions, ExtractStats, ListedEntry, OverwriteMode, ReaderOptions,
    DEFAULT_BUFFER_SIZE,
};

use std::io::Read;

/// Opens a reader over `source`, hands it to `f`, then closes it.
///
/// The reader is closed and freed whether or not `f` succeeds. An error from
/// `f` takes precedence over an error from closing.
pub fn with_reader<R, T, F>(source: R, f: F) -> Result<T>
where
    R: Read,
    F: FnOnce(&mut Reader<R>) -> Result<T>,
{
    with_reader_options(source, ReaderOptions::default(), f)
}

/// [`with_reader`] with explicit reader options.
pub fn with_reader_options<R, T, F>(source: R, options: ReaderOptions, f: F) -> Result<T>
where
    R: Read,
    F: FnOnce(&mut Reader<R>) -> Result<T>,
{
    let mut reader = Reader::with_options(source, options)?;
    let outcome = f(&mut reader);
    let closed = reader.close();
    let value = outcome?;
    closed?;
    Ok(value)
}

/// Version string of the linked libarchive, e.g. `"libarchive 3.7.2"`.
pub fn version_string() -> String {
    unsafe { ffi::owned_string(ffi::archive_version_string()) }.unwrap_or_default()
}

/// Numeric version of the linked libarchive, e.g. `3007002`.
pub fn version_number() -> i32 {
    unsafe { ffi::archive_version_number() }
}
