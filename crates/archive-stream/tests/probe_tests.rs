//! Integration tests for archive listing.

mod common;

use archive_stream::{list_entries, list_entries_with, ArchiveError, EntryType, ReaderOptions};
use common::{ar_archive, gzip, tar_archive, Member};
use std::io::Cursor;

#[test]
fn test_list_tar_gz() {
    let data = gzip(&tar_archive(&[
        Member::Dir("docs"),
        Member::File("docs/readme.txt", b"Read me first"),
        Member::File("docs/notes.txt", b"Notes"),
    ]));

    let listing = list_entries(Cursor::new(data)).unwrap();

    assert!(listing.format.contains("tar"));
    assert_eq!(listing.filters, vec!["gzip".to_string()]);
    assert!(!listing.raw);
    assert_eq!(listing.entries.len(), 3);
    assert_eq!(listing.entries[0].entry_type, EntryType::Directory);
    assert_eq!(listing.entries[1].path, "docs/readme.txt");
    assert_eq!(listing.entries[1].size, 13);
    assert_eq!(listing.entries[2].size, 5);
    assert_eq!(listing.total_bytes(), 18);
}

#[test]
fn test_list_links() {
    let data = tar_archive(&[
        Member::File("a.txt", b"target"),
        Member::Symlink("soft", "a.txt"),
        Member::Hardlink("hard", "a.txt"),
    ]);

    let listing = list_entries(Cursor::new(data)).unwrap();

    assert_eq!(listing.entries[0].link_target, None);
    assert_eq!(listing.entries[1].entry_type, EntryType::Symlink);
    assert_eq!(listing.entries[1].link_target.as_deref(), Some("a.txt"));
    assert_eq!(listing.entries[2].entry_type, EntryType::Hardlink);
    assert_eq!(listing.entries[2].link_target.as_deref(), Some("a.txt"));
}

#[test]
fn test_list_raw_stream() {
    let listing = list_entries(Cursor::new(gzip(b"just some text\n"))).unwrap();

    assert!(listing.raw);
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].path, "data");
    assert_eq!(listing.entries[0].size, 15);
}

#[test]
fn test_list_json_shape() {
    let data = tar_archive(&[
        Member::File("a.txt", b"abc"),
        Member::Symlink("link", "a.txt"),
    ]);
    let listing = list_entries(Cursor::new(data)).unwrap();

    let json = serde_json::to_value(&listing).unwrap();
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries[0]["path"], "a.txt");
    assert_eq!(entries[0]["entry_type"], "file");
    assert_eq!(entries[0]["size"], 3);
    assert!(entries[0].get("link_target").is_none());
    assert_eq!(entries[1]["entry_type"], "symlink");
    assert_eq!(entries[1]["link_target"], "a.txt");
    assert_eq!(json["raw"], false);
}

#[test]
fn test_list_corrupt_archive_fails() {
    let mut data = ar_archive(&[("foo1", b"hello"), ("foo2", b"world")]);
    data[133] = b'X';

    let result = list_entries(Cursor::new(data));
    assert!(matches!(result, Err(ArchiveError::InvalidHeaderSignature)));
}

#[test]
fn test_list_with_small_buffer() {
    let data = tar_archive(&[Member::File("a.bin", &[1u8; 4000])]);

    let options = ReaderOptions { buffer_size: 64 };
    let listing = list_entries_with(Cursor::new(data), options).unwrap();
    assert_eq!(listing.entries[0].size, 4000);
}
