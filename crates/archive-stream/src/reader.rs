//! The archive reader: owns a libarchive read handle and the byte-source
//! bridge feeding it, and walks members one header at a time.

use crate::bridge::{bridge_close, bridge_open, bridge_read, SourceBridge};
use crate::entry::Entry;
use crate::error::{log_warning, translate, translate_data_failure, ArchiveError, Result};
use crate::ffi;
use crate::types::ReaderOptions;
use libc::{c_int, ssize_t};
use std::io::{self, Read};
use std::ptr::{self, NonNull};

/// Warn statuses tolerated in a row from one data read before giving up.
const MAX_CONSECUTIVE_WARNINGS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Opened, no member selected yet.
    Header,
    /// A member is selected; its content can be read.
    Data,
    /// End of archive reached.
    Finished,
    /// A header or data call failed; nothing more is read.
    Poisoned,
}

/// Streaming reader over any archive or compressed stream libarchive
/// understands.
///
/// Iterate members with [`next_entry`](Reader::next_entry) until it returns
/// [`ArchiveError::ArchiveEof`], reading each member's content through
/// [`read_data`](Reader::read_data) or the [`Read`] implementation. Release
/// the native handle with [`close`](Reader::close); dropping the reader does
/// the same but can only log teardown failures.
///
/// A reader is not shareable between threads, but it can be moved to another
/// thread when its source can.
pub struct Reader<R> {
    archive: Option<NonNull<ffi::archive>>,
    bridge: NonNull<SourceBridge<R>>,
    headers_read: u64,
    state: ReaderState,
}

// The handle and the bridge are exclusively owned by this reader.
unsafe impl<R: Send> Send for Reader<R> {}

impl<R: Read> Reader<R> {
    /// Opens a reader with the default 8 KiB buffer.
    pub fn new(source: R) -> Result<Self> {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_buffer_size(source: R, buffer_size: usize) -> Result<Self> {
        Self::with_options(source, ReaderOptions { buffer_size })
    }

    /// Allocates the libarchive handle, enables every filter and format plus
    /// raw pass-through, installs the bridge and performs the open handshake.
    ///
    /// Opening already pulls from the source while libarchive sniffs the
    /// format, so an empty or unreadable source can fail here.
    pub fn with_options(source: R, options: ReaderOptions) -> Result<Self> {
        if options.buffer_size == 0 {
            return Err(ArchiveError::InvalidBufferSize);
        }

        let archive = NonNull::new(unsafe { ffi::archive_read_new() })
            .ok_or_else(|| ArchiveError::Fatal("archive_read_new returned null".to_string()))?;
        let bridge = Box::new(SourceBridge::new(source, options.buffer_size));

        // From here on Drop releases both the handle and the bridge.
        let mut reader = Reader {
            archive: Some(archive),
            bridge: NonNull::from(Box::leak(bridge)),
            headers_read: 0,
            state: ReaderState::Header,
        };

        let code = unsafe {
            let a = archive.as_ptr();
            ffi::archive_read_support_filter_all(a);
            ffi::archive_read_support_format_all(a);
            ffi::archive_read_support_format_raw(a);
            ffi::archive_read_open(
                a,
                reader.bridge.as_ptr().cast(),
                Some(bridge_open),
                Some(bridge_read::<R>),
                Some(bridge_close),
            )
        };
        reader.check(code)?;

        tracing::debug!(buffer_size = options.buffer_size, "archive reader opened");
        Ok(reader)
    }
}

impl<R> Reader<R> {
    /// Advances to the next member.
    ///
    /// Returns [`ArchiveError::ArchiveEof`] once the archive is exhausted, or
    /// [`ArchiveError::UnexpectedEof`] if the stream ends before a single
    /// header was read. Any other error ends iteration for good; later calls
    /// return [`ArchiveError::Poisoned`].
    pub fn next_entry(&mut self) -> Result<Entry> {
        match self.state {
            ReaderState::Poisoned => return Err(ArchiveError::Poisoned),
            ReaderState::Finished => return Err(ArchiveError::ArchiveEof),
            ReaderState::Header | ReaderState::Data => {}
        }
        let archive = self.handle()?;

        let mut raw_entry: *mut ffi::archive_entry = ptr::null_mut();
        let code = unsafe { ffi::archive_read_next_header(archive, &mut raw_entry) };

        if let Err(e) = self.check(code) {
            self.state = if e.is_eof() {
                ReaderState::Finished
            } else {
                ReaderState::Poisoned
            };
            return Err(e);
        }
        if raw_entry.is_null() {
            self.state = ReaderState::Poisoned;
            return Err(ArchiveError::Fatal(
                "archive_read_next_header returned no entry".to_string(),
            ));
        }

        self.headers_read += 1;
        self.state = ReaderState::Data;
        let entry = unsafe { Entry::from_raw(raw_entry) };
        tracing::debug!(
            path = entry.path_name(),
            index = self.headers_read,
            "read archive header"
        );
        Ok(entry)
    }

    /// Iterator over the remaining members. Unread content is skipped.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            reader: self,
            done: false,
        }
    }

    /// Reads content of the current member into `buf`.
    ///
    /// Returns [`ArchiveError::ArchiveEof`] when the member is exhausted (or
    /// when no member is selected); advance with
    /// [`next_entry`](Reader::next_entry). An empty `buf` reads nothing and
    /// returns `Ok(0)`.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.state {
            ReaderState::Poisoned => return Err(ArchiveError::Poisoned),
            ReaderState::Header | ReaderState::Finished => return Err(ArchiveError::ArchiveEof),
            ReaderState::Data => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let archive = self.handle()?;

        let mut warnings = 0;
        let n = loop {
            let n = unsafe { ffi::archive_read_data(archive, buf.as_mut_ptr().cast(), buf.len()) };
            // A warning ends the current block only; the next call moves on.
            if n == ffi::ARCHIVE_WARN as ssize_t && warnings < MAX_CONSECUTIVE_WARNINGS {
                warnings += 1;
                log_warning(self.error_string().as_deref());
                continue;
            }
            break n;
        };
        if n > 0 {
            return Ok(n as usize);
        }
        if n == 0 {
            return Err(ArchiveError::ArchiveEof);
        }

        let err = match self.bridge_mut().take_failure() {
            Some(source) => ArchiveError::Source(source),
            None => translate_data_failure(self.error_string().as_deref()),
        };
        if n == ffi::ARCHIVE_FATAL as ssize_t {
            self.state = ReaderState::Poisoned;
        }
        Err(err)
    }

    /// Whether the input is a bare (possibly compressed) stream rather than a
    /// structured archive. Meaningful after a successful
    /// [`next_entry`](Reader::next_entry).
    pub fn is_raw(&self) -> bool {
        self.archive
            .map(|a| unsafe { ffi::archive_format(a.as_ptr()) } == ffi::ARCHIVE_FORMAT_RAW)
            .unwrap_or(false)
    }

    /// libarchive's name for the detected format, e.g. `"GNU tar format"`.
    pub fn format_name(&self) -> Option<String> {
        let archive = self.archive?;
        unsafe { ffi::owned_string(ffi::archive_format_name(archive.as_ptr())) }
    }

    /// Decompression filters applied to the input, in the order they were
    /// peeled off the raw bytes.
    pub fn filter_names(&self) -> Vec<String> {
        let Some(archive) = self.archive else {
            return Vec::new();
        };
        let a = archive.as_ptr();
        let count = unsafe { ffi::archive_filter_count(a) };

        (0..count)
            .rev()
            .filter(|&i| unsafe { ffi::archive_filter_code(a, i) } != ffi::ARCHIVE_FILTER_NONE)
            .filter_map(|i| unsafe { ffi::owned_string(ffi::archive_filter_name(a, i)) })
            .collect()
    }

    /// Number of headers consumed so far.
    pub fn headers_read(&self) -> u64 {
        self.headers_read
    }

    /// Number of raw bytes pulled from the source so far.
    pub fn source_bytes_read(&self) -> u64 {
        unsafe { self.bridge.as_ref() }.bytes_pulled()
    }

    /// Closes and frees the native handle, returning the first failure.
    ///
    /// Both steps always run, so the handle is released even when closing
    /// fails.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn handle(&self) -> Result<*mut ffi::archive> {
        self.archive
            .map(NonNull::as_ptr)
            .ok_or(ArchiveError::Poisoned)
    }

    fn bridge_mut(&mut self) -> &mut SourceBridge<R> {
        // libarchive is not running, so nothing else touches the bridge.
        unsafe { self.bridge.as_mut() }
    }

    /// Translates a status code from an open or header call.
    fn check(&mut self, code: c_int) -> Result<()> {
        if code == ffi::ARCHIVE_OK {
            return Ok(());
        }
        if let Some(source) = self.bridge_mut().take_failure() {
            return Err(ArchiveError::Source(source));
        }
        let diagnostic = self.error_string();
        if code < ffi::ARCHIVE_WARN {
            tracing::debug!(
                code,
                errno = self.errno(),
                diagnostic = diagnostic.as_deref().unwrap_or(""),
                "libarchive reported failure"
            );
        }
        translate(code, self.headers_read, diagnostic.as_deref())
    }

    fn error_string(&self) -> Option<String> {
        let archive = self.archive?;
        unsafe { ffi::owned_string(ffi::archive_error_string(archive.as_ptr())) }
    }

    fn errno(&self) -> c_int {
        self.archive
            .map(|a| unsafe { ffi::archive_errno(a.as_ptr()) })
            .unwrap_or(0)
    }

    fn teardown(&mut self) -> Result<()> {
        let Some(archive) = self.archive.take() else {
            return Ok(());
        };

        let (close_code, free_code) = unsafe {
            let a = archive.as_ptr();
            (ffi::archive_read_close(a), ffi::archive_read_free(a))
        };
        // libarchive holds no reference to the bridge once freed.
        let bridge = unsafe { Box::from_raw(self.bridge.as_ptr()) };
        tracing::debug!(
            headers = self.headers_read,
            source_bytes = bridge.bytes_pulled(),
            "archive reader closed"
        );
        drop(bridge);

        if close_code == ffi::ARCHIVE_FATAL || free_code == ffi::ARCHIVE_FATAL {
            return Err(ArchiveError::FatalClosing);
        }
        Ok(())
    }
}

impl<R> Drop for Reader<R> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "archive reader teardown failed during drop");
        }
    }
}

/// Content of the current member. End of member reads as `Ok(0)`.
impl<R> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_data(buf) {
            Ok(n) => Ok(n),
            Err(ArchiveError::ArchiveEof) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// Iterator returned by [`Reader::entries`].
///
/// Yields members until end of archive. The first error is yielded once and
/// ends iteration.
pub struct Entries<'a, R> {
    reader: &'a mut Reader<R>,
    done: bool,
}

impl<R> Entries<'_, R> {
    /// The underlying reader, e.g. to read the current member's content.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        self.reader
    }
}

impl<R> Iterator for Entries<'_, R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.done = true;
                if e.is_eof() {
                    None
                } else {
                    Some(Err(e))
                }
            }
        }
    }
}

impl<R> std::iter::FusedIterator for Entries<'_, R> {}
