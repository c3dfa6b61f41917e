//! Cryptographic types and constants

/// Hash purposes, each selecting one row of the crypt table
pub mod hash_type {
    /// Hash for table offset calculation
    pub const TABLE_OFFSET: u32 = 0;
    /// First part of filename hash
    pub const NAME_A: u32 = 1;
    /// Second part of filename hash
    pub const NAME_B: u32 = 2;
    /// File encryption key generation (path is stripped before hashing)
    pub const FILE_KEY: u32 = 3;
}

/// Key of the on-disk hash table, `hash_string("(hash table)", FILE_KEY)`
pub const HASH_TABLE_KEY: u32 = 0xC3AF_3770;

/// Key of the on-disk block table, `hash_string("(block table)", FILE_KEY)`
pub const BLOCK_TABLE_KEY: u32 = 0xEC83_B3A3;

/// Initial value of the cipher's running seed
pub(crate) const CIPHER_SEED: u32 = 0xEEEE_EEEE;

/// Advance a cipher key by one dword
#[inline]
pub(crate) const fn next_key(key: u32) -> u32 {
    ((!key) << 0x15).wrapping_add(0x1111_1111) | (key >> 0x0B)
}
