//! Encryption operations for MPQ files

use super::keys::{CIPHER_ROW, ENCRYPTION_TABLE};
use super::types::{CIPHER_SEED, next_key};
use byteorder::{ByteOrder, LittleEndian};

/// Encrypt a block of data
pub fn encrypt_block(data: &mut [u32], mut key: u32) {
    let mut seed: u32 = CIPHER_SEED;

    for value in data.iter_mut() {
        seed = seed.wrapping_add(ENCRYPTION_TABLE[CIPHER_ROW + (key & 0xFF) as usize]);

        // The seed always mixes in the plaintext word
        let plain = *value;
        *value = plain ^ key.wrapping_add(seed);

        key = next_key(key);
        seed = plain
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Encrypt a byte buffer in place.
///
/// Only whole little-endian dwords are enciphered; a trailing partial dword
/// is left as is.
pub fn encrypt_bytes(data: &mut [u8], key: u32) {
    let whole = data.len() / 4 * 4;
    let mut words = vec![0u32; whole / 4];
    LittleEndian::read_u32_into(&data[..whole], &mut words);
    encrypt_block(&mut words, key);
    LittleEndian::write_u32_into(&words, &mut data[..whole]);
}
