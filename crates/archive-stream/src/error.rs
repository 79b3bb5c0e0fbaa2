//! Error types for archive reading and extraction, plus the translation of
//! libarchive status codes into them.

use crate::ffi;
use libc::c_int;
use std::io;
use thiserror::Error;

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Main error type for archive operations.
///
/// `ArchiveEof` is not a failure: it ends the current scope, either the
/// content of the current member (from [`Reader::read_data`]) or the archive
/// itself (from [`Reader::next_entry`]). Check for it with
/// [`ArchiveError::is_eof`] rather than comparing messages.
///
/// [`Reader::read_data`]: crate::Reader::read_data
/// [`Reader::next_entry`]: crate::Reader::next_entry
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Normal end of the current member or of the archive.
    #[error("end of archive")]
    ArchiveEof,

    /// The stream ended where more data was structurally required.
    #[error("unexpected end of archive data")]
    UnexpectedEof,

    /// A header's magic or signature could not be validated.
    #[error("invalid header signature")]
    InvalidHeaderSignature,

    /// libarchive reported a fatal error; the reader is unusable afterwards.
    #[error("libarchive fatal error: {0}")]
    Fatal(String),

    /// libarchive reported a fatal error while closing or freeing the handle.
    #[error("libarchive fatal error while closing archive")]
    FatalClosing,

    /// Any other libarchive failure, carrying its diagnostic text.
    #[error("libarchive operation failed: {0}")]
    Failed(String),

    /// The wrapped byte source failed while libarchive was pulling from it.
    #[error("byte source read failed: {0}")]
    Source(#[source] io::Error),

    /// A zero-sized read buffer was requested.
    #[error("read buffer size must be greater than zero")]
    InvalidBufferSize,

    /// An earlier error ended iteration; no further headers or data are read.
    #[error("reader is unusable after an earlier error")]
    Poisoned,

    /// A filesystem error occurred while extracting.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Whether this is the ordinary end-of-scope signal.
    pub fn is_eof(&self) -> bool {
        matches!(self, ArchiveError::ArchiveEof)
    }
}

impl From<ArchiveError> for io::Error {
    fn from(err: ArchiveError) -> Self {
        let kind = match &err {
            ArchiveError::ArchiveEof | ArchiveError::UnexpectedEof => io::ErrorKind::UnexpectedEof,
            ArchiveError::InvalidHeaderSignature | ArchiveError::Fatal(_) => {
                io::ErrorKind::InvalidData
            }
            ArchiveError::InvalidBufferSize => io::ErrorKind::InvalidInput,
            ArchiveError::Source(e) | ArchiveError::Io(e) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Translates a header-level status code.
///
/// `headers_consumed` disambiguates end-of-archive: with nothing consumed yet
/// the stream held no archive at all, which is reported as `UnexpectedEof`.
/// `diagnostic` is libarchive's error string at the time of the call.
pub(crate) fn translate(
    code: c_int,
    headers_consumed: u64,
    diagnostic: Option<&str>,
) -> Result<()> {
    match code {
        ffi::ARCHIVE_OK => Ok(()),
        ffi::ARCHIVE_EOF if headers_consumed == 0 => Err(ArchiveError::UnexpectedEof),
        ffi::ARCHIVE_EOF => Err(ArchiveError::ArchiveEof),
        ffi::ARCHIVE_WARN => {
            log_warning(diagnostic);
            Ok(())
        }
        c if c > 0 => Ok(()),
        c => Err(classify_failure(c, diagnostic)),
    }
}

/// Logs libarchive's diagnostic for a warn status. The operation itself
/// completed.
pub(crate) fn log_warning(diagnostic: Option<&str>) {
    tracing::warn!(
        diagnostic = diagnostic.unwrap_or(""),
        "libarchive reported a warning"
    );
}

/// Translates a negative return from a data read.
pub(crate) fn translate_data_failure(diagnostic: Option<&str>) -> ArchiveError {
    match diagnostic.filter(|msg| !msg.is_empty()) {
        Some(msg) if is_truncation(msg) => ArchiveError::UnexpectedEof,
        Some(msg) => ArchiveError::Failed(msg.to_string()),
        None => ArchiveError::Failed("data read failed".to_string()),
    }
}

fn classify_failure(code: c_int, diagnostic: Option<&str>) -> ArchiveError {
    let Some(msg) = diagnostic.filter(|msg| !msg.is_empty()) else {
        // libarchive gives up silently when a read-ahead runs dry
        return match code {
            ffi::ARCHIVE_FATAL => ArchiveError::UnexpectedEof,
            ffi::ARCHIVE_FAILED => ArchiveError::Failed("operation failed".to_string()),
            c => ArchiveError::Failed(format!("libarchive status {c}")),
        };
    };

    if is_truncation(msg) {
        ArchiveError::UnexpectedEof
    } else if is_bad_signature(msg) {
        ArchiveError::InvalidHeaderSignature
    } else if code == ffi::ARCHIVE_FATAL {
        ArchiveError::Fatal(msg.to_string())
    } else {
        ArchiveError::Failed(msg.to_string())
    }
}

fn is_truncation(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    ["truncated", "premature end", "unexpected end", "unexpected eof"]
        .iter()
        .any(|needle| msg.contains(needle))
}

fn is_bad_signature(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    ["signature", "bad magic", "bad header checksum"]
        .iter()
        .any(|needle| msg.contains(needle))
}

/// Security-related errors during extraction.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Path traversal attempt detected (e.g., "../../../etc/passwd").
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// Absolute path not allowed in archive entries.
    #[error("Absolute path not allowed: {0}")]
    AbsolutePath(String),
}
