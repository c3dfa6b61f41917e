//! Stream-backed and file-backed archives

use crate::common::{build_archive, init_logger, sample_files};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use war3_mpq::{Archive, OpenOptions};

#[test]
fn test_stream_mode_defers_reads() {
    init_logger();
    let files = sample_files();
    let file = tempfile::NamedTempFile::new().unwrap();
    build_archive(&files).save(file.path()).unwrap();

    let archive = OpenOptions::new().stream_mode(true).open(file.path()).unwrap();
    assert!(archive.entries().all(|entry| entry.is_deferred()));
    for (name, data) in &files {
        assert_eq!(&archive.read_file(name).unwrap(), data, "{name}");
    }
}

#[test]
fn test_stream_mode_modify_and_save() {
    let files = sample_files();
    let bytes = build_archive(&files).serialize().unwrap();

    let mut archive = OpenOptions::new()
        .stream_mode(true)
        .open_reader(Cursor::new(bytes))
        .unwrap();
    archive.insert("added.txt", b"added later").unwrap();
    archive.remove("war3map.w3e").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modified.w3x");
    archive.save(&path).unwrap();

    let reopened = Archive::open(&path).unwrap();
    assert_eq!(reopened.read_file("added.txt").unwrap(), b"added later");
    assert_eq!(reopened.read_file("war3map.j").unwrap(), files[0].1);
    assert!(reopened.find("war3map.w3e").is_none());
}

#[test]
fn test_open_reader_without_stream_mode() {
    let files = sample_files();
    let bytes = build_archive(&files).serialize().unwrap();

    let archive = OpenOptions::new().open_reader(Cursor::new(&bytes)).unwrap();
    assert!(archive.entries().all(|entry| !entry.is_deferred()));
    assert_eq!(archive.read_file("war3map.w3i").unwrap(), b"Map info");
}

#[test]
fn test_write_to() {
    let archive = build_archive(&sample_files());
    let mut out = Vec::new();
    archive.write_to(&mut out).unwrap();
    assert_eq!(out, archive.serialize().unwrap());
}
