//! Hash algorithms for MPQ file name hashing

use super::keys::{ENCRYPTION_TABLE, ENCRYPTION_TABLE_SIZE};
use super::types::hash_type;

/// Hash a string using the MPQ hash algorithm.
///
/// Input is case-insensitive and `/` is treated as `\`. For
/// [`hash_type::FILE_KEY`] only the part after the last path separator
/// takes part in the hash.
pub fn hash_string(filename: &str, hash_type: u32) -> u32 {
    let input = if hash_type == hash_type::FILE_KEY {
        plain_name(filename)
    } else {
        filename
    };

    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for &byte in input.as_bytes() {
        let ch = if byte == b'/' {
            b'\\'
        } else {
            byte.to_ascii_uppercase()
        };

        let table_idx = ((hash_type << 8) + u32::from(ch)) as usize;
        seed1 = ENCRYPTION_TABLE[table_idx % ENCRYPTION_TABLE_SIZE] ^ seed1.wrapping_add(seed2);
        seed2 = u32::from(ch)
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// Return the final path component of an archive name
pub fn plain_name(filename: &str) -> &str {
    filename
        .rfind(['\\', '/'])
        .map_or(filename, |pos| &filename[pos + 1..])
}

/// Base encryption key of a file, derived from its name
pub fn file_key(filename: &str) -> u32 {
    hash_string(filename, hash_type::FILE_KEY)
}

/// The two-part name hash that identifies a file in the hash table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameHash {
    /// Hash with purpose [`hash_type::NAME_A`]
    pub name_a: u32,
    /// Hash with purpose [`hash_type::NAME_B`]
    pub name_b: u32,
}

impl NameHash {
    /// Compute both name hashes of a filename
    pub fn new(filename: &str) -> Self {
        Self {
            name_a: hash_string(filename, hash_type::NAME_A),
            name_b: hash_string(filename, hash_type::NAME_B),
        }
    }

    /// Build from already known hash values
    pub const fn from_parts(name_a: u32, name_b: u32) -> Self {
        Self { name_a, name_b }
    }
}

impl From<&str> for NameHash {
    fn from(filename: &str) -> Self {
        Self::new(filename)
    }
}
