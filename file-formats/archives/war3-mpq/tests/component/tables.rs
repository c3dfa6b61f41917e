//! Hash and block table tests

use pretty_assertions::assert_eq;
use war3_mpq::crypto::NameHash;
use war3_mpq::{BlockEntry, BlockTable, HashEntry, HashTable, is_safe_index};

fn extent(file_size: u32) -> BlockEntry {
    BlockEntry {
        file_pos: 0x20,
        compressed_size: file_size,
        file_size,
        flags: BlockEntry::FLAG_EXISTS,
    }
}

#[test]
fn test_safe_index_masking() {
    assert!(is_safe_index(0x8000_0010));
    assert!(is_safe_index(0x0000_0010));
    assert!(!is_safe_index(0x9000));
    assert!(!is_safe_index(0x8000_9000));
}

#[test]
fn test_table_round_trip() {
    let hash_table = HashTable::from_entries(vec![
        HashEntry::new(NameHash::new("war3map.j"), 0),
        HashEntry::empty(),
        HashEntry::new(NameHash::new("war3map.w3e"), 1),
        HashEntry::deleted(),
    ]);
    let block_table = BlockTable::from_entries(vec![extent(100), extent(200)]);

    let hash_bytes = hash_table.to_bytes();
    let block_bytes = block_table.to_bytes();
    assert_eq!(hash_bytes.len(), 64);
    assert_eq!(block_bytes.len(), 32);

    assert_eq!(
        HashTable::from_bytes(&hash_bytes).unwrap().entries(),
        hash_table.entries()
    );
    assert_eq!(
        BlockTable::from_bytes(&block_bytes).unwrap().entries(),
        block_table.entries()
    );
}

#[test]
fn test_unreferenced_and_implausible_extents_are_tombstoned() {
    let mut hash_table = HashTable::from_entries(vec![
        HashEntry::new(NameHash::new("a.txt"), 0),
        HashEntry::new(NameHash::new("b.txt"), 2),
        HashEntry::new(NameHash::new("c.txt"), 3),
        HashEntry::new(NameHash::new("d.txt"), 7),
    ]);
    let mut huge = extent(0x1000_0000);
    huge.compressed_size = 10;
    let mut missing = extent(10);
    missing.flags = 0;
    let mut block_table = BlockTable::from_entries(vec![extent(10), extent(10), huge, missing]);

    let rejected = block_table.tombstone_unreferenced(&mut hash_table);
    assert_eq!(rejected, vec![1, 2, 3]);

    assert_eq!(block_table.entries()[0], extent(10));
    for index in 1..4 {
        assert_eq!(block_table.entries()[index], BlockEntry::tombstone());
    }

    // Slots that pointed at rejected or missing extents are now deletion markers
    assert!(hash_table.entries()[0].is_live());
    for index in 1..4 {
        assert!(hash_table.entries()[index].is_deleted());
    }
}

#[test]
fn test_block_flags() {
    let mut entry = extent(10);
    entry.flags |= BlockEntry::FLAG_IMPLODE | BlockEntry::FLAG_ENCRYPTED | BlockEntry::FLAG_FIX_KEY;
    assert!(entry.is_compressed());
    assert!(entry.is_imploded());
    assert!(!entry.is_multi_compressed());
    assert!(entry.is_encrypted());
    assert!(entry.has_fix_key());
    assert!(!entry.is_single_unit());
    assert!(entry.is_plausible());

    entry.flags |= BlockEntry::FLAG_COMPRESS;
    assert!(!entry.is_imploded());
    assert!(entry.is_multi_compressed());
}
