//! Known-plaintext recovery of file keys
//!
//! The first dword of a sectored file's offset table is fully determined by
//! the file size and sector size, and the second dword is bounded by them.
//! Because the cipher's first output word only depends on `key` and
//! `table[0x400 + (key & 0xFF)]`, trying all 256 values of the low key byte
//! is enough to pin the key down without knowing the file name.

use super::keys::{CIPHER_ROW, ENCRYPTION_TABLE};
use super::types::{CIPHER_SEED, next_key};
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Expected first dword of the sector offset table of a file
pub fn expected_table_size(file_size: u32, sector_size: u32) -> u32 {
    let sectors = file_size.div_ceil(sector_size);
    (sectors + 1) * 4
}

/// Recover the key of a sectored file from its first eight bytes of
/// ciphertext.
///
/// The returned value is the key of sector 0; the offset table itself is
/// encrypted with that key minus one.
pub fn recover_file_key(ciphertext: &[u8], file_size: u32, sector_size: u32) -> Result<u32> {
    if ciphertext.len() < 8 || file_size == 0 || sector_size == 0 {
        return Err(Error::KeyNotFound { name: None });
    }

    let expected0 = expected_table_size(file_size, sector_size);
    let expected1 = expected0.wrapping_add(sector_size);
    let encrypted0 = LittleEndian::read_u32(&ciphertext[0..4]);
    let encrypted1 = LittleEndian::read_u32(&ciphertext[4..8]);

    let key_sum = (encrypted0 ^ expected0).wrapping_sub(CIPHER_SEED);

    for low in 0..0x100 {
        let key1 = key_sum.wrapping_sub(ENCRYPTION_TABLE[CIPHER_ROW + low]);
        let seed = CIPHER_SEED.wrapping_add(ENCRYPTION_TABLE[CIPHER_ROW + (key1 & 0xFF) as usize]);

        if encrypted0 ^ key1.wrapping_add(seed) != expected0 {
            continue;
        }

        let next = next_key(key1);
        let next_seed = seed
            .wrapping_add(expected0)
            .wrapping_add(seed << 5)
            .wrapping_add(3)
            .wrapping_add(ENCRYPTION_TABLE[CIPHER_ROW + (next & 0xFF) as usize]);

        if encrypted1 ^ next.wrapping_add(next_seed) <= expected1 {
            log::debug!("Recovered file key 0x{:08X}", key1.wrapping_add(1));
            return Ok(key1.wrapping_add(1));
        }
    }

    Err(Error::KeyNotFound { name: None })
}
