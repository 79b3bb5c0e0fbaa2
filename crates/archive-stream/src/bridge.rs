//! Adapter that lets libarchive pull bytes from any [`std::io::Read`].
//!
//! libarchive drives input through a callback triple registered with
//! `archive_read_open`. The read callback hands back a pointer into a single
//! buffer owned by the [`SourceBridge`]. libarchive copies whatever it needs
//! out of that block before it calls back again, so one buffer is refilled in
//! place for the whole life of the reader.
//!
//! The bridge lives on the heap behind a raw pointer owned by the reader, so
//! its address stays fixed while libarchive holds it as `client_data`.

use crate::ffi;
use libc::{c_int, c_void, ssize_t};
use std::ffi::CString;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};

/// Owns the wrapped source and the block buffer libarchive reads from.
pub(crate) struct SourceBridge<R> {
    source: R,
    buffer: Box<[u8]>,
    failure: Option<io::Error>,
    bytes_pulled: u64,
}

impl<R: Read> SourceBridge<R> {
    pub(crate) fn new(source: R, buffer_size: usize) -> Self {
        Self {
            source,
            buffer: vec![0u8; buffer_size].into_boxed_slice(),
            failure: None,
            bytes_pulled: 0,
        }
    }

    /// Refills the block buffer from the source.
    fn fill(&mut self) -> io::Result<usize> {
        loop {
            match self.source.read(&mut self.buffer) {
                Ok(n) => {
                    self.bytes_pulled += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R> SourceBridge<R> {
    /// Takes the source error recorded by the last failed read, if any.
    pub(crate) fn take_failure(&mut self) -> Option<io::Error> {
        self.failure.take()
    }

    pub(crate) fn bytes_pulled(&self) -> u64 {
        self.bytes_pulled
    }
}

/// Open callback. The source is already open by construction.
pub(crate) unsafe extern "C" fn bridge_open(
    _archive: *mut ffi::archive,
    _client_data: *mut c_void,
) -> c_int {
    ffi::ARCHIVE_OK
}

/// Close callback. The source is released by the reader's teardown instead.
pub(crate) unsafe extern "C" fn bridge_close(
    _archive: *mut ffi::archive,
    _client_data: *mut c_void,
) -> c_int {
    ffi::ARCHIVE_OK
}

/// Read callback.
///
/// Returns the number of valid bytes at `*block`, zero at end of stream, or
/// `-1` after recording the source error on both the bridge and the archive.
///
/// # Safety
/// - `client_data` must be the `SourceBridge<R>` registered for `archive`.
/// - No other reference to the bridge may be live during the call.
/// - The pointer stored in `*block` is valid until the next call or until the
///   bridge is dropped, whichever comes first.
pub(crate) unsafe extern "C" fn bridge_read<R: Read>(
    archive: *mut ffi::archive,
    client_data: *mut c_void,
    block: *mut *const c_void,
) -> ssize_t {
    if client_data.is_null() || block.is_null() {
        return -1;
    }
    let bridge = &mut *(client_data as *mut SourceBridge<R>);

    // Unwinding into C is not allowed, so a panicking source becomes a read error.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| bridge.fill()))
        .unwrap_or_else(|_| Err(io::Error::other("byte source panicked")));

    match outcome {
        Ok(n) => {
            tracing::trace!(bytes = n, "bridge read");
            *block = bridge.buffer.as_ptr().cast();
            n as ssize_t
        }
        Err(e) => {
            tracing::warn!(error = %e, "byte source read failed, reporting to libarchive");
            report_to_archive(archive, &e);
            bridge.failure = Some(e);
            *block = std::ptr::null();
            -1
        }
    }
}

/// Records a source error as the archive's diagnostic so that libarchive's
/// own error string names the cause.
unsafe fn report_to_archive(archive: *mut ffi::archive, err: &io::Error) {
    if archive.is_null() {
        return;
    }
    let message = CString::new(err.to_string().replace('\0', " "))
        .unwrap_or_else(|_| CString::from(c"byte source read failed"));
    let errno = err.raw_os_error().unwrap_or(libc::EIO);
    ffi::archive_set_error(archive, errno, c"%s".as_ptr(), message.as_ptr());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Flaky {
        interrupts: usize,
        data: Cursor<Vec<u8>>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupts > 0 {
                self.interrupts -= 1;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_read_callback_hands_out_buffer_start() {
        let mut bridge = SourceBridge::new(Cursor::new(b"hello".to_vec()), 16);
        let mut block: *const c_void = std::ptr::null();

        let n = unsafe {
            bridge_read::<Cursor<Vec<u8>>>(
                std::ptr::null_mut(),
                &mut bridge as *mut _ as *mut c_void,
                &mut block,
            )
        };

        assert_eq!(n, 5);
        assert_eq!(block, bridge.buffer.as_ptr() as *const c_void);
        assert_eq!(&bridge.buffer[..5], b"hello");
        assert_eq!(bridge.bytes_pulled(), 5);
    }

    #[test]
    fn test_read_callback_reports_exhaustion_as_zero() {
        let mut bridge = SourceBridge::new(Cursor::new(Vec::new()), 8);
        let mut block: *const c_void = std::ptr::null();

        let n = unsafe {
            bridge_read::<Cursor<Vec<u8>>>(
                std::ptr::null_mut(),
                &mut bridge as *mut _ as *mut c_void,
                &mut block,
            )
        };

        assert_eq!(n, 0);
        assert!(bridge.take_failure().is_none());
    }

    #[test]
    fn test_read_callback_retries_interrupted_reads() {
        let source = Flaky {
            interrupts: 3,
            data: Cursor::new(b"abc".to_vec()),
        };
        let mut bridge = SourceBridge::new(source, 8);
        let mut block: *const c_void = std::ptr::null();

        let n = unsafe {
            bridge_read::<Flaky>(
                std::ptr::null_mut(),
                &mut bridge as *mut _ as *mut c_void,
                &mut block,
            )
        };

        assert_eq!(n, 3);
    }

    #[test]
    fn test_read_callback_records_source_failure() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
            }
        }

        let mut bridge = SourceBridge::new(Broken, 8);
        let mut block: *const c_void = std::ptr::null();

        let n = unsafe {
            bridge_read::<Broken>(
                std::ptr::null_mut(),
                &mut bridge as *mut _ as *mut c_void,
                &mut block,
            )
        };

        assert_eq!(n, -1);
        assert!(block.is_null());
        let failure = bridge.take_failure().expect("failure recorded");
        assert_eq!(failure.kind(), io::ErrorKind::BrokenPipe);
        assert!(bridge.take_failure().is_none());
    }

    #[test]
    fn test_read_callback_contains_panics() {
        struct Panics;
        impl Read for Panics {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                panic!("source exploded");
            }
        }

        let mut bridge = SourceBridge::new(Panics, 8);
        let mut block: *const c_void = std::ptr::null();

        let n = unsafe {
            bridge_read::<Panics>(
                std::ptr::null_mut(),
                &mut bridge as *mut _ as *mut c_void,
                &mut block,
            )
        };

        assert_eq!(n, -1);
        assert!(bridge.take_failure().is_some());
    }
}
