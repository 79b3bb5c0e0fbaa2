//! Option and result types shared by reading, listing and extraction.

use crate::entry::{EntryType, FileMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default size of the block buffer libarchive reads from (8 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Options for opening a [`Reader`](crate::Reader).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Size of the single buffer the byte source is read into
    pub buffer_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Options for extracting an archive.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// How to handle file conflicts during extraction
    pub overwrite: OverwriteMode,

    /// Number of leading path components to strip from extracted files
    pub strip_components: u32,

    /// Whether to create symbolic links found in the archive
    pub allow_symlinks: bool,

    /// Options for the underlying reader
    pub reader: ReaderOptions,

    /// File name for the single member of a raw (non-archive) stream.
    /// Without it libarchive's placeholder name `data` is used.
    pub raw_name: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            overwrite: OverwriteMode::Rename,
            strip_components: 0,
            allow_symlinks: false,
            reader: ReaderOptions::default(),
            raw_name: None,
        }
    }
}

/// How to handle file conflicts during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    /// Replace existing files
    Replace,

    /// Skip files that already exist
    Skip,

    /// Rename new files by appending (1), (2), etc.
    Rename,
}

impl std::str::FromStr for OverwriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(OverwriteMode::Replace),
            "skip" => Ok(OverwriteMode::Skip),
            "rename" => Ok(OverwriteMode::Rename),
            other => Err(format!(
                "unknown overwrite mode '{other}' (expected replace, skip or rename)"
            )),
        }
    }
}

/// Statistics about a completed extraction operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractStats {
    /// Number of regular files written
    pub files_extracted: u64,

    /// Number of directories created
    pub directories_created: u64,

    /// Number of symbolic and hard links created
    pub links_created: u64,

    /// Entries skipped by path validation, policy or overwrite mode
    pub entries_skipped: u64,

    /// Total bytes written to disk
    pub bytes_written: u64,

    /// Duration of the extraction operation (in seconds)
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Everything learned by walking an archive once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveListing {
    /// Format name reported by libarchive (e.g. "GNU tar format")
    pub format: String,

    /// Decompression filters applied to the stream, outermost first
    pub filters: Vec<String>,

    /// Whether the input was a bare compressed stream rather than an archive
    pub raw: bool,

    /// All members in archive order
    pub entries: Vec<ListedEntry>,
}

impl ArchiveListing {
    /// Sum of the content bytes of every member.
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// One member of an [`ArchiveListing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedEntry {
    /// Path of the entry within the archive
    pub path: String,

    /// Coarse entry classification
    pub entry_type: EntryType,

    /// Content bytes actually read from the member
    pub size: u64,

    /// Permission and type bits
    pub mode: FileMode,

    /// Symlink or hardlink target, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

// Helper module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
