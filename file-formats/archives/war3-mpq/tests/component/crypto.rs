//! Integration tests for crypto functionality

use war3_mpq::crypto::{
    BLOCK_TABLE_KEY, ENCRYPTION_TABLE, HASH_TABLE_KEY, NameHash, decrypt_block, decrypt_bytes,
    encrypt_block, encrypt_bytes, expected_table_size, file_key, hash_string, hash_type,
    recover_file_key,
};

#[test]
fn test_encryption_table_is_initialized() {
    assert_eq!(ENCRYPTION_TABLE.len(), 0x500);
    assert_eq!(ENCRYPTION_TABLE[0], 0x55C6_36E2);
    assert_eq!(ENCRYPTION_TABLE[1], 0x02BE_0170);
}

#[test]
fn test_table_keys_are_name_hashes() {
    assert_eq!(hash_string("(hash table)", hash_type::FILE_KEY), HASH_TABLE_KEY);
    assert_eq!(hash_string("(block table)", hash_type::FILE_KEY), BLOCK_TABLE_KEY);
}

#[test]
fn test_hash_is_case_insensitive() {
    for purpose in 0..4 {
        assert_eq!(
            hash_string("Foo\\Bar.txt", purpose),
            hash_string("FOO\\BAR.TXT", purpose)
        );
    }
}

#[test]
fn test_file_key_strips_path() {
    assert_eq!(
        hash_string("a\\b\\c.mpq", hash_type::FILE_KEY),
        hash_string("c.mpq", hash_type::FILE_KEY)
    );
    assert_eq!(file_key("Scripts\\war3map.j"), file_key("war3map.j"));
    // Only the key purpose strips the path
    assert_ne!(
        hash_string("a\\b\\c.mpq", hash_type::NAME_A),
        hash_string("c.mpq", hash_type::NAME_A)
    );
}

#[test]
fn test_name_hash_parts() {
    let hash = NameHash::new("war3map.j");
    assert_eq!(hash.name_a, hash_string("war3map.j", hash_type::NAME_A));
    assert_eq!(hash.name_b, hash_string("war3map.j", hash_type::NAME_B));
    assert_eq!(NameHash::from("WAR3MAP.J"), hash);
}

#[test]
fn test_large_data_encryption() {
    let mut large_data: Vec<u32> = (0..10000).collect();
    let original = large_data.clone();
    let key = 0xDEAD_BEEF;

    encrypt_block(&mut large_data, key);
    assert_ne!(large_data, original);

    decrypt_block(&mut large_data, key);
    assert_eq!(large_data, original);
}

#[test]
fn test_zero_key_still_encrypts() {
    let original = vec![0x1234_5678u32; 4];
    let mut data = original.clone();
    encrypt_block(&mut data, 0);
    assert_ne!(data, original);
    decrypt_block(&mut data, 0);
    assert_eq!(data, original);
}

#[test]
fn test_trailing_bytes_are_untouched() {
    let original: Vec<u8> = (0..11).collect();
    let mut data = original.clone();
    encrypt_bytes(&mut data, 0x1111_1111);
    assert_ne!(&data[..8], &original[..8]);
    assert_eq!(&data[8..], &original[8..]);

    decrypt_bytes(&mut data, 0x1111_1111);
    assert_eq!(data, original);
}

#[test]
fn test_key_recovery_from_offset_table() {
    let key = file_key("war3map.j");
    let file_size = 10_000u32;
    let sector_size = 4096u32;
    let table_size = expected_table_size(file_size, sector_size);
    assert_eq!(table_size, 16);

    // Offset table of a three-sector file
    let mut words = vec![table_size, table_size + 1200, table_size + 2500, table_size + 3100];
    encrypt_block(&mut words, key.wrapping_sub(1));
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();

    assert_eq!(recover_file_key(&bytes, file_size, sector_size).unwrap(), key);
}

#[test]
fn test_key_recovery_failure() {
    // Plain bytes that decrypt to nothing plausible under any key
    let bytes = [0u8; 8];
    assert!(recover_file_key(&bytes[..4], 100, 4096).is_err());
    assert!(recover_file_key(&bytes, 0, 4096).is_err());
}
