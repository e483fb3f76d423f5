//! Multi-volume archive tests.

mod common;

use common::{ArchiveBuilder, read_all};
use tempfile::TempDir;
use unseven::Archive;

fn numbered_archive() -> ArchiveBuilder {
    // Ten stored files "01".."10", each with enough content that the
    // payload spans several volumes.
    let mut builder = ArchiveBuilder::new();
    for i in 1..=10u32 {
        let name = format!("{:02}", i);
        let data: Vec<u8> = name.bytes().cycle().take(400).collect();
        builder = builder.stored_file(&name, &data);
    }
    builder
}

#[test]
fn volumes_are_discovered_in_order() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("multi.7z");
    let paths = numbered_archive().write_volumes(&base, 6);
    assert_eq!(paths.len(), 6);

    let archive = Archive::open(&paths[0]).unwrap();
    assert_eq!(archive.volumes(), &paths[..]);
    assert_eq!(archive.files().len(), 10);
}

#[test]
fn files_extract_across_volume_boundaries() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("multi.7z");
    let paths = numbered_archive().write_volumes(&base, 6);

    let archive = Archive::open(&paths[0]).unwrap();
    for (i, file) in archive.files().iter().enumerate() {
        let expected: Vec<u8> = format!("{:02}", i + 1).bytes().cycle().take(400).collect();
        let content = read_all(file).unwrap();
        assert_eq!(content, expected, "file {}", file.name);
        assert_eq!(file.checksum().unwrap(), crc32fast::hash(&content));
    }
}

#[test]
fn first_volume_suffix_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("CASE.7Z");
    let paths = numbered_archive().write_volumes(&base, 3);

    let archive = Archive::open(&paths[0]).unwrap();
    assert_eq!(archive.volumes().len(), 3);
    assert_eq!(archive.files().len(), 10);
}

#[test]
fn missing_volume_set_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let err = Archive::open(dir.path().join("absent.7z.001")).unwrap_err();
    assert!(matches!(err, unseven::Error::Io(_)));
}
