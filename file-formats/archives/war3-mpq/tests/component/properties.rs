//! Property tests for the cipher, the name hash and the sector codec

use proptest::prelude::*;
use war3_mpq::compression::sector::{decode_sectors, encode_sectors};
use war3_mpq::compression::{CompressionMethod, SectorMode};
use war3_mpq::crypto::{decrypt_bytes, encrypt_bytes, hash_string, hash_type};

const SECTOR: usize = 4096;

fn lossless_method() -> impl Strategy<Value = CompressionMethod> {
    prop_oneof![
        Just(CompressionMethod::Zlib),
        Just(CompressionMethod::PKWare),
        Just(CompressionMethod::Huffman),
    ]
}

/// Sector-sized buffers, either uniform random or drawn from a few symbols
fn sector_data() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 1..=SECTOR),
        prop::collection::vec(0u8..6, 1..=SECTOR),
    ]
}

proptest! {
    #[test]
    fn cipher_is_an_involution(
        words in prop::collection::vec(any::<u32>(), 0..256),
        key in any::<u32>()
    ) {
        let original: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let mut data = original.clone();
        encrypt_bytes(&mut data, key);
        decrypt_bytes(&mut data, key);
        prop_assert_eq!(data, original);
    }

    #[test]
    fn hash_ignores_case(name in "[a-zA-Z0-9_.\\\\]{0,40}", purpose in 0u32..4) {
        prop_assert_eq!(
            hash_string(&name.to_ascii_lowercase(), purpose),
            hash_string(&name.to_ascii_uppercase(), purpose)
        );
    }

    #[test]
    fn file_key_ignores_directories(dirs in "([a-z]{1,8}\\\\){1,4}", file in "[a-z]{1,12}\\.[a-z]{3}") {
        prop_assert_eq!(
            hash_string(&format!("{dirs}{file}"), hash_type::FILE_KEY),
            hash_string(&file, hash_type::FILE_KEY)
        );
    }

    #[test]
    fn sector_round_trip(
        data in sector_data(),
        method in lossless_method(),
        key in prop::option::of(any::<u32>())
    ) {
        let encoded = encode_sectors(&data, SECTOR, method, key)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let decoded = decode_sectors(&encoded, data.len(), SECTOR, SectorMode::Tagged, false, key)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, data);
    }
}
