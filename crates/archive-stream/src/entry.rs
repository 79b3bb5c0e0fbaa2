//! Archive members as seen through `archive_read_next_header`.
//!
//! An [`Entry`] is copied out of libarchive's per-header state when the reader
//! advances, so it stays valid after the reader moves on. Content is read
//! through the [`Reader`](crate::Reader), which tracks the active member.

use crate::ffi;
use libc::mode_t;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One archive member: names, link targets and file metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path_name: String,
    symlink: String,
    hardlink: Option<String>,
    metadata: EntryMetadata,
}

impl Entry {
    /// Snapshots the native entry.
    ///
    /// # Safety
    /// `entry` must be the handle returned by the most recent successful
    /// `archive_read_next_header` on a live archive.
    pub(crate) unsafe fn from_raw(entry: *mut ffi::archive_entry) -> Self {
        let path_name = ffi::owned_string(ffi::archive_entry_pathname(entry)).unwrap_or_default();
        let symlink = ffi::owned_string(ffi::archive_entry_symlink(entry)).unwrap_or_default();
        let hardlink = ffi::owned_string(ffi::archive_entry_hardlink(entry));
        let mode = FileMode::from_native(
            ffi::archive_entry_perm(entry),
            ffi::archive_entry_filetype(entry),
        );

        Self {
            metadata: EntryMetadata {
                name: base_name(&path_name).to_string(),
                size: ffi::archive_entry_size(entry),
                mode,
            },
            path_name,
            symlink,
            hardlink,
        }
    }

    /// Path of the member within the archive.
    pub fn path_name(&self) -> &str {
        &self.path_name
    }

    /// Symlink target, or an empty string when the member is not a symlink.
    pub fn symlink(&self) -> &str {
        &self.symlink
    }

    /// Hardlink target, or an empty string when the member is not a hardlink.
    pub fn hardlink(&self) -> &str {
        self.hardlink.as_deref().unwrap_or("")
    }

    pub fn is_hardlink(&self) -> bool {
        self.hardlink.is_some()
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// Coarse classification used by extraction policy.
    pub fn entry_type(&self) -> EntryType {
        let mode = self.metadata.mode;
        if self.is_hardlink() {
            EntryType::Hardlink
        } else if mode.is_dir() {
            EntryType::Directory
        } else if mode.is_symlink() {
            EntryType::Symlink
        } else if mode.is_regular() {
            EntryType::File
        } else {
            EntryType::Other
        }
    }
}

/// File metadata of an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    name: String,
    size: i64,
    mode: FileMode,
}

impl EntryMetadata {
    /// Final component of the member's path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size in bytes.
    ///
    /// Only regular files are guaranteed to report the number of bytes their
    /// content yields. Some formats reuse this field for links and
    /// directories (cpio stores a symlink's target there, hardlinks often
    /// report zero), so treat it as advisory for anything else.
    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }
}

/// Entry type for filtering special file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Hard link
    Hardlink,
    /// Other special file types (device, socket, etc.)
    Other,
}

/// Permission bits combined with a synthesized file type bit.
///
/// The type bits sit above the permission bits and never overlap them. A mode
/// with no type bit set describes a regular file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(u32);

impl FileMode {
    pub const DIR: FileMode = FileMode(1 << 31);
    pub const SYMLINK: FileMode = FileMode(1 << 27);
    pub const DEVICE: FileMode = FileMode(1 << 26);
    pub const NAMED_PIPE: FileMode = FileMode(1 << 25);
    pub const SOCKET: FileMode = FileMode(1 << 24);
    pub const CHAR_DEVICE: FileMode = FileMode(1 << 21);

    /// Mask of every type bit.
    pub const TYPE_MASK: FileMode = FileMode(
        Self::DIR.0
            | Self::SYMLINK.0
            | Self::DEVICE.0
            | Self::NAMED_PIPE.0
            | Self::SOCKET.0
            | Self::CHAR_DEVICE.0,
    );

    /// Permission bits including setuid, setgid and sticky.
    pub const PERM_MASK: u32 = 0o7777;

    pub const fn from_bits(bits: u32) -> Self {
        FileMode(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a mode from libarchive's permission bits and file type.
    pub(crate) fn from_native(perm: mode_t, filetype: mode_t) -> Self {
        let perm = FileMode(perm as u32 & Self::PERM_MASK);
        let kind = match filetype & ffi::AE_IFMT {
            ffi::AE_IFLNK => Self::SYMLINK,
            ffi::AE_IFSOCK => Self::SOCKET,
            ffi::AE_IFCHR => Self::DEVICE | Self::CHAR_DEVICE,
            ffi::AE_IFBLK => Self::DEVICE,
            ffi::AE_IFDIR => Self::DIR,
            ffi::AE_IFIFO => Self::NAMED_PIPE,
            _ => FileMode(0),
        };
        perm | kind
    }

    pub const fn contains(self, other: FileMode) -> bool {
        self.0 & other.0 == other.0
    }

    /// The rwx bits only.
    pub const fn permissions(self) -> u32 {
        self.0 & 0o777
    }

    pub const fn file_type(self) -> FileMode {
        FileMode(self.0 & Self::TYPE_MASK.0)
    }

    pub const fn is_dir(self) -> bool {
        self.contains(Self::DIR)
    }

    pub const fn is_symlink(self) -> bool {
        self.contains(Self::SYMLINK)
    }

    pub const fn is_regular(self) -> bool {
        self.0 & Self::TYPE_MASK.0 == 0
    }
}

impl std::ops::BitOr for FileMode {
    type Output = FileMode;

    fn bitor(self, rhs: FileMode) -> FileMode {
        FileMode(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FileMode {
    fn bitor_assign(&mut self, rhs: FileMode) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for FileMode {
    /// `ls -l` style, e.g. `drwxr-xr-x` or `crw-rw----`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() {
            'd'
        } else if self.is_symlink() {
            'l'
        } else if self.contains(Self::SOCKET) {
            's'
        } else if self.contains(Self::CHAR_DEVICE) {
            'c'
        } else if self.contains(Self::DEVICE) {
            'b'
        } else if self.contains(Self::NAMED_PIPE) {
            'p'
        } else {
            '-'
        };

        let mut out = String::with_capacity(10);
        out.push(kind);
        for shift in [6u32, 3, 0] {
            let triad = (self.0 >> shift) & 0o7;
            out.push(if triad & 0o4 != 0 { 'r' } else { '-' });
            out.push(if triad & 0o2 != 0 { 'w' } else { '-' });
            out.push(if triad & 0o1 != 0 { 'x' } else { '-' });
        }
        f.write_str(&out)
    }
}

impl fmt::Debug for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileMode({self} {:#o})", self.0 & Self::PERM_MASK)
    }
}

/// Last element of a slash-separated path.
///
/// Trailing slashes are ignored, an empty path yields `"."` and a path made
/// only of slashes yields `"/"`.
pub(crate) fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
