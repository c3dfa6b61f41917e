//! Decryption operations for MPQ files

use super::keys::{CIPHER_ROW, ENCRYPTION_TABLE};
use super::types::{CIPHER_SEED, next_key};
use byteorder::{ByteOrder, LittleEndian};

/// Decrypt a block of data
pub fn decrypt_block(data: &mut [u32], mut key: u32) {
    let mut seed: u32 = CIPHER_SEED;

    for value in data.iter_mut() {
        seed = seed.wrapping_add(ENCRYPTION_TABLE[CIPHER_ROW + (key & 0xFF) as usize]);

        let plain = *value ^ key.wrapping_add(seed);
        *value = plain;

        key = next_key(key);
        seed = plain
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Decrypt a single DWORD value (the first dword of a stream)
pub fn decrypt_dword(value: u32, key: u32) -> u32 {
    let seed = CIPHER_SEED.wrapping_add(ENCRYPTION_TABLE[CIPHER_ROW + (key & 0xFF) as usize]);
    value ^ key.wrapping_add(seed)
}

/// Decrypt a byte buffer in place, the inverse of
/// [`encrypt_bytes`](super::encrypt_bytes)
pub fn decrypt_bytes(data: &mut [u8], key: u32) {
    let whole = data.len() / 4 * 4;
    let mut words = vec![0u32; whole / 4];
    LittleEndian::read_u32_into(&data[..whole], &mut words);
    decrypt_block(&mut words, key);
    LittleEndian::write_u32_into(&words, &mut data[..whole]);
}
