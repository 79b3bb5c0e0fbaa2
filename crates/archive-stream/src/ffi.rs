//! Raw declarations for the slice of libarchive this crate drives.
//!
//! Only the read side is declared. Every pointer handed out by these
//! functions is owned by libarchive; nothing here frees or retains them.

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void, mode_t, size_t, ssize_t};
use std::ffi::CStr;

/// Opaque `struct archive`.
#[repr(C)]
pub struct archive {
    _private: [u8; 0],
}

/// Opaque `struct archive_entry`.
#[repr(C)]
pub struct archive_entry {
    _private: [u8; 0],
}

pub const ARCHIVE_EOF: c_int = 1;
pub const ARCHIVE_OK: c_int = 0;
pub const ARCHIVE_WARN: c_int = -20;
pub const ARCHIVE_FAILED: c_int = -25;
pub const ARCHIVE_FATAL: c_int = -30;

/// `archive_format()` value of the raw pass-through reader.
pub const ARCHIVE_FORMAT_RAW: c_int = 0x90000;

/// `archive_filter_code()` value of the identity filter.
pub const ARCHIVE_FILTER_NONE: c_int = 0;

pub const AE_IFMT: mode_t = 0o170000;
pub const AE_IFLNK: mode_t = 0o120000;
pub const AE_IFSOCK: mode_t = 0o140000;
pub const AE_IFCHR: mode_t = 0o020000;
pub const AE_IFBLK: mode_t = 0o060000;
pub const AE_IFDIR: mode_t = 0o040000;
pub const AE_IFIFO: mode_t = 0o010000;

pub type archive_open_callback = unsafe extern "C" fn(*mut archive, *mut c_void) -> c_int;
pub type archive_read_callback =
    unsafe extern "C" fn(*mut archive, *mut c_void, *mut *const c_void) -> ssize_t;
pub type archive_close_callback = unsafe extern "C" fn(*mut archive, *mut c_void) -> c_int;

extern "C" {
    pub fn archive_version_number() -> c_int;
    pub fn archive_version_string() -> *const c_char;

    pub fn archive_read_new() -> *mut archive;
    pub fn archive_read_support_filter_all(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_all(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_raw(a: *mut archive) -> c_int;
    pub fn archive_read_open(
        a: *mut archive,
        client_data: *mut c_void,
        open: Option<archive_open_callback>,
        read: Option<archive_read_callback>,
        close: Option<archive_close_callback>,
    ) -> c_int;
    pub fn archive_read_next_header(a: *mut archive, entry: *mut *mut archive_entry) -> c_int;
    pub fn archive_read_data(a: *mut archive, buf: *mut c_void, size: size_t) -> ssize_t;
    pub fn archive_read_close(a: *mut archive) -> c_int;
    pub fn archive_read_free(a: *mut archive) -> c_int;

    pub fn archive_format(a: *mut archive) -> c_int;
    pub fn archive_format_name(a: *mut archive) -> *const c_char;
    pub fn archive_filter_count(a: *mut archive) -> c_int;
    pub fn archive_filter_code(a: *mut archive, n: c_int) -> c_int;
    pub fn archive_filter_name(a: *mut archive, n: c_int) -> *const c_char;

    pub fn archive_errno(a: *mut archive) -> c_int;
    pub fn archive_error_string(a: *mut archive) -> *const c_char;
    pub fn archive_set_error(a: *mut archive, err: c_int, fmt: *const c_char, ...);

    pub fn archive_entry_pathname(entry: *mut archive_entry) -> *const c_char;
    pub fn archive_entry_symlink(entry: *mut archive_entry) -> *const c_char;
    pub fn archive_entry_hardlink(entry: *mut archive_entry) -> *const c_char;
    pub fn archive_entry_size(entry: *mut archive_entry) -> i64;
    pub fn archive_entry_perm(entry: *mut archive_entry) -> mode_t;
    pub fn archive_entry_filetype(entry: *mut archive_entry) -> mode_t;
}

/// Copies a libarchive-owned C string, mapping null to `None`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub(crate) unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}
