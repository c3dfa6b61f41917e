//! Key recovery and position-adjusted keys

use crate::common::{RawArchive, build_archive, init_logger, sample_files};
use pretty_assertions::assert_eq;
use war3_mpq::compression::SectorMode;
use war3_mpq::compression::sector::recrypt;
use war3_mpq::crypto::{adjust_key, file_key};
use war3_mpq::{Archive, BlockEntry, Error, InsertOptions, OpenOptions};

#[test]
fn test_unknown_names_are_readable_through_recovery() {
    init_logger();
    let files = sample_files();
    let bytes = build_archive(&files).serialize().unwrap();
    let archive = Archive::open_bytes(&bytes).unwrap();

    // Nothing has been named yet; compressed files still decode
    let entry = archive
        .entries()
        .find(|entry| archive.block_table().get(entry.block_index()).unwrap().file_size == 9000)
        .unwrap();
    assert_eq!(entry.name(), None);
    assert_eq!(archive.read(entry).unwrap(), files[0].1);
    assert_eq!(entry.key(), Some(file_key("war3map.j")));
    assert_eq!(archive.file_key(entry).unwrap(), file_key("war3map.j"));
}

#[test]
fn test_recover_keys_repairs_compressed_size() {
    init_logger();
    let files = sample_files();
    let mut raw = RawArchive::parse(build_archive(&files).serialize().unwrap());
    let block = raw.block_of("war3map.j");
    let true_size = raw.block_table.entries()[block].compressed_size;
    raw.block_table.get_mut(block).unwrap().compressed_size = 0x0FFF_FFFF;
    raw.write_tables();

    // Without recovery the bogus size runs past the end of the archive
    let plain = Archive::open_bytes(&raw.bytes).unwrap();
    assert_eq!(plain.issues().len(), 1);
    assert_eq!(plain.issues()[0].block_index, block);
    assert!(plain.find("war3map.j").is_none());

    let recovered = OpenOptions::new().recover_keys(true).open_bytes(&raw.bytes).unwrap();
    assert!(recovered.issues().is_empty());
    assert_eq!(
        recovered.block_table().get(block).unwrap().compressed_size,
        true_size
    );
    let entry = recovered.find("war3map.j").unwrap();
    assert_eq!(entry.key(), Some(file_key("war3map.j")));
    assert_eq!(recovered.read(entry).unwrap(), files[0].1);
}

#[test]
fn test_uncompressed_encrypted_needs_name() {
    let data = b"secret but uncompressed".to_vec();
    let mut archive = Archive::new();
    archive
        .insert_with("secret.txt", &data, InsertOptions::new().compression(None))
        .unwrap();
    let bytes = archive.serialize().unwrap();

    let reopened = Archive::open_bytes(&bytes).unwrap();
    let entry = reopened.entries().next().unwrap();
    assert!(matches!(
        reopened.read(entry),
        Err(Error::KeyNotFound { name: None })
    ));
    assert_eq!(reopened.read_file("secret.txt").unwrap(), data);
}

/// Convert a stored file to a position-adjusted key in place
fn apply_fix_key(raw: &mut RawArchive, name: &str) {
    let block = raw.block_of(name);
    let entry = raw.block_table.entries()[block];
    let base = file_key(name);
    let fixed = adjust_key(base, entry.file_pos as u32, entry.file_size);

    let mode = if entry.is_multi_compressed() {
        SectorMode::Tagged
    } else {
        SectorMode::Uncompressed
    };
    let start = raw.payload_start(block);
    let end = start + entry.compressed_size as usize;
    recrypt(
        &mut raw.bytes[start..end],
        entry.file_size as usize,
        4096,
        mode,
        entry.is_single_unit(),
        false,
        base,
        fixed,
    )
    .unwrap();

    raw.block_table.get_mut(block).unwrap().flags |= BlockEntry::FLAG_FIX_KEY;
    raw.write_tables();
}

#[test]
fn test_fix_key_files_follow_their_position() {
    init_logger();
    let script = b"call SetPlayerName(Player(0), \"Blue\")\n".repeat(200);
    let strings = b"TRIGSTR_001 Welcome".to_vec();

    let mut archive = Archive::new();
    archive.insert("padding.bin", &[7u8; 3000]).unwrap();
    archive.insert("war3map.j", &script).unwrap();
    archive
        .insert_with("war3map.wts", &strings, InsertOptions::new().compression(None))
        .unwrap();

    let mut raw = RawArchive::parse(archive.serialize().unwrap());
    apply_fix_key(&mut raw, "war3map.j");
    apply_fix_key(&mut raw, "war3map.wts");

    let mut fixed = Archive::open_bytes(&raw.bytes).unwrap();
    assert_eq!(fixed.read_file("war3map.j").unwrap(), script);
    assert_eq!(fixed.read_file("war3map.wts").unwrap(), strings);

    // Removing the first file moves both FIX_KEY files forward
    fixed.remove("padding.bin").unwrap();
    let moved = fixed.serialize().unwrap();

    let reopened = Archive::open_bytes(&moved).unwrap();
    let block = reopened.find("war3map.wts").unwrap().block_index();
    let extent = reopened.block_table().get(block).unwrap();
    assert!(extent.has_fix_key());
    assert_eq!(reopened.read_file("war3map.j").unwrap(), script);
    assert_eq!(reopened.read_file("war3map.wts").unwrap(), strings);
}

#[test]
fn test_set_plaintext_clears_fix_key() {
    let mut archive = Archive::new();
    archive.insert("war3map.j", b"old script").unwrap();
    let mut raw = RawArchive::parse(archive.serialize().unwrap());
    apply_fix_key(&mut raw, "war3map.j");

    let mut fixed = Archive::open_bytes(&raw.bytes).unwrap();
    fixed.set_plaintext("war3map.j", b"new script").unwrap();
    let block = fixed.find("war3map.j").unwrap().block_index();
    assert!(!fixed.block_table().get(block).unwrap().has_fix_key());

    let bytes = fixed.serialize().unwrap();
    let reopened = Archive::open_bytes(&bytes).unwrap();
    assert_eq!(reopened.read_file("war3map.j").unwrap(), b"new script");
}
