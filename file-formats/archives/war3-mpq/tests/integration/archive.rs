//! Archive-level operations: insert, remove, purge, shuffle, serialize

use crate::common::{build_archive, init_logger, sample_files};
use pretty_assertions::assert_eq;
use war3_mpq::compression::CompressionMethod;
use war3_mpq::{Archive, Error, InsertOptions, OpenOptions, ShuffleOptions};

#[test]
fn test_end_to_end_hello() {
    init_logger();
    let mut archive = Archive::new();
    archive.insert("test.txt", b"hello").unwrap();
    let bytes = archive.serialize().unwrap();

    let reopened = Archive::open_bytes(&bytes).unwrap();
    let entry = reopened.find("test.txt").unwrap();
    assert_eq!(reopened.read(entry).unwrap(), b"hello");
}

#[test]
fn test_sample_files_survive_serialization() {
    init_logger();
    let files = sample_files();
    let bytes = build_archive(&files).serialize().unwrap();

    let reopened = Archive::open_bytes(&bytes).unwrap();
    assert!(reopened.issues().is_empty());
    assert_eq!(reopened.entries().count(), files.len());
    for (name, data) in &files {
        assert_eq!(&reopened.read_file(name).unwrap(), data, "{name}");
    }
}

#[test]
fn test_insert_options() {
    init_logger();
    let data = b"Trigger string data ".repeat(500);
    let variants = [
        ("plain.txt", InsertOptions::new().compression(None).encrypt(false)),
        ("encrypted.txt", InsertOptions::new().compression(None)),
        ("pkware.txt", InsertOptions::new().compression(Some(CompressionMethod::PKWare))),
        ("huffman.txt", InsertOptions::new().compression(Some(CompressionMethod::Huffman))),
        ("single.txt", InsertOptions::new().single_unit(true)),
        ("single_plain.txt", InsertOptions::new().single_unit(true).compression(None)),
    ];

    let mut archive = Archive::new();
    for (name, options) in variants {
        archive.insert_with(name, &data, options).unwrap();
    }
    let bytes = archive.serialize().unwrap();

    let reopened = Archive::open_bytes(&bytes).unwrap();
    for (name, _) in variants {
        assert_eq!(reopened.read_file(name).unwrap(), data, "{name}");
    }
    let plain = reopened.find("plain.txt").unwrap();
    assert_eq!(reopened.read_raw(plain).unwrap(), data);
}

#[test]
fn test_tombstone_reuse_keeps_table_sizes() {
    let mut archive = Archive::new();
    archive.insert("keep.txt", b"keep").unwrap();
    archive.insert("test.txt", b"first").unwrap();
    let hash_len = archive.hash_table().len();
    let block_len = archive.block_table().len();

    archive.remove("test.txt").unwrap();
    assert_eq!(archive.hash_table().len(), hash_len);
    assert_eq!(archive.block_table().len(), block_len);
    assert!(archive.find("test.txt").is_none());

    archive.insert("test.txt", b"second").unwrap();
    assert_eq!(archive.hash_table().len(), hash_len);
    assert_eq!(archive.block_table().len(), block_len);
    assert_eq!(archive.read_file("test.txt").unwrap(), b"second");
    assert_eq!(archive.read_file("keep.txt").unwrap(), b"keep");
}

#[test]
fn test_remove_zeroes_extent_and_marks_slot() {
    let mut archive = build_archive(&sample_files());
    let entry = archive.find("war3map.w3i").unwrap();
    let (slot, block) = (entry.hash_index(), entry.block_index());

    archive.remove("war3map.w3i").unwrap();
    assert!(archive.hash_table().get(slot).unwrap().is_deleted());
    assert_eq!(
        *archive.block_table().get(block).unwrap(),
        war3_mpq::BlockEntry::tombstone()
    );

    let reopened_bytes = archive.serialize().unwrap();
    let reopened = Archive::open_bytes(&reopened_bytes).unwrap();
    assert!(reopened.find("war3map.w3i").is_none());
    assert_eq!(reopened.entries().count(), sample_files().len() - 1);
}

#[test]
fn test_shuffle_preserves_lookups() {
    init_logger();
    let files = sample_files();
    let mut archive = build_archive(&files);
    for index in 0..40 {
        archive
            .insert(&format!("Doodads\\tree{index}.mdx"), format!("tree {index}").as_bytes())
            .unwrap();
    }
    archive.remove("Doodads\\tree7.mdx").unwrap();

    archive.shuffle(ShuffleOptions::seeded(0x5EED)).unwrap();
    for (name, data) in &files {
        assert_eq!(&archive.read_file(name).unwrap(), data, "{name}");
    }
    for entry in archive.entries() {
        let slot = archive.hash_table().get(entry.hash_index()).unwrap();
        assert_eq!(slot.live_block_index(), Some(entry.block_index()));
    }

    let bytes = archive.serialize().unwrap();
    let reopened = Archive::open_bytes(&bytes).unwrap();
    for (name, data) in &files {
        assert_eq!(&reopened.read_file(name).unwrap(), data, "{name}");
    }
    assert_eq!(reopened.read_file("Doodads\\tree39.mdx").unwrap(), b"tree 39");
    assert!(reopened.find("Doodads\\tree7.mdx").is_none());
}

#[test]
fn test_unseeded_shuffle() {
    let files = sample_files();
    let mut archive = build_archive(&files);
    archive
        .shuffle(ShuffleOptions {
            iterations: 64,
            seed: None,
        })
        .unwrap();
    for (name, data) in &files {
        assert_eq!(&archive.read_file(name).unwrap(), data);
    }
}

#[test]
fn test_purge_after_remove() {
    let files = sample_files();
    let mut archive = build_archive(&files);
    archive.remove("war3map.j").unwrap();
    archive.remove("empty.txt").unwrap();

    archive.purge(false).unwrap();
    assert_eq!(archive.block_table().len(), files.len() - 2);
    assert_eq!(archive.hash_table().len(), files.len());

    archive.purge(true).unwrap();
    assert_eq!(archive.hash_table().len(), files.len() - 2);
    assert!(
        archive
            .hash_table()
            .entries()
            .iter()
            .all(|slot| slot.locale == 0 && slot.platform == 0)
    );

    let bytes = archive.serialize().unwrap();
    let reopened = Archive::open_bytes(&bytes).unwrap();
    for (name, data) in files.iter().filter(|(name, _)| *name != "war3map.j" && *name != "empty.txt") {
        assert_eq!(&reopened.read_file(name).unwrap(), data);
    }
}

#[test]
fn test_set_plaintext() {
    let mut archive = build_archive(&sample_files());
    archive.set_plaintext("war3map.w3i", b"Updated map info").unwrap();
    assert_eq!(archive.read_file("war3map.w3i").unwrap(), b"Updated map info");

    let bytes = archive.serialize().unwrap();
    let reopened = Archive::open_bytes(&bytes).unwrap();
    assert_eq!(reopened.read_file("war3map.w3i").unwrap(), b"Updated map info");
    assert!(matches!(
        archive.set_plaintext("missing.txt", b"x"),
        Err(Error::FileNotFound(_))
    ));
}

#[test]
fn test_read_only_refuses_mutation() {
    let bytes = build_archive(&sample_files()).serialize().unwrap();
    let mut archive = OpenOptions::new().read_only(true).open_bytes(&bytes).unwrap();
    assert!(archive.is_read_only());

    assert!(matches!(archive.insert("new.txt", b"x"), Err(Error::AccessViolation)));
    assert!(matches!(archive.remove("war3map.j"), Err(Error::AccessViolation)));
    assert!(matches!(
        archive.set_plaintext("war3map.j", b"x"),
        Err(Error::AccessViolation)
    ));
    assert!(matches!(archive.purge(true), Err(Error::AccessViolation)));
    assert!(matches!(
        archive.shuffle(ShuffleOptions::default()),
        Err(Error::AccessViolation)
    ));

    // Reads and serialization still work
    assert_eq!(archive.read_file("war3map.w3i").unwrap(), b"Map info");
    let block = archive.find("war3map.w3i").unwrap().block_index();
    archive.set_name(block, "war3map.w3i").unwrap();
    let again = archive.serialize().unwrap();
    assert_eq!(again, bytes);
}

#[test]
fn test_listfile_names() {
    let mut archive = build_archive(&sample_files());
    archive
        .insert("(listfile)", b"war3map.j\r\nwar3map.w3e\r\nunknown.txt\r\n")
        .unwrap();
    let bytes = archive.serialize().unwrap();

    let reopened = Archive::open_bytes(&bytes).unwrap();
    assert_eq!(reopened.names().count(), 0);
    assert_eq!(reopened.load_listfile().unwrap(), 2);

    let mut names: Vec<_> = reopened.names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["(listfile)", "war3map.j", "war3map.w3e"]);
}
