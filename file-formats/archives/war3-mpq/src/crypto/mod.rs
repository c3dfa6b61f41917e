//! Cryptographic operations for MPQ files
//!
//! Everything here is built on a single 1280-word crypt table:
//!
//! - **Hashing**: the MPQ name hash, used with four purposes (table offset,
//!   two name hashes, and the per-file key)
//! - **Encryption/Decryption**: the dword stream cipher protecting the hash
//!   table, the block table, and individual file sectors
//! - **Key recovery**: a known-plaintext attack that finds the key of a
//!   compressed file whose name is unknown
//!
//! ## Examples
//!
//! ```
//! use war3_mpq::crypto::{hash_string, hash_type, encrypt_block, decrypt_block};
//!
//! let name_a = hash_string("war3map.j", hash_type::NAME_A);
//! let key = hash_string("war3map.j", hash_type::FILE_KEY);
//!
//! let mut words = vec![name_a, 0, 1, 2];
//! encrypt_block(&mut words, key);
//! decrypt_block(&mut words, key);
//! assert_eq!(words, vec![name_a, 0, 1, 2]);
//! ```

mod decryption;
mod encryption;
mod hash;
mod keys;
mod recovery;
mod types;

pub use decryption::{decrypt_block, decrypt_bytes, decrypt_dword};
pub use encryption::{encrypt_block, encrypt_bytes};
pub use hash::{NameHash, file_key, hash_string, plain_name};
pub use keys::{ENCRYPTION_TABLE, ENCRYPTION_TABLE_SIZE};
pub use recovery::{expected_table_size, recover_file_key};
pub use types::{BLOCK_TABLE_KEY, HASH_TABLE_KEY, hash_type};

/// Apply the position adjustment of `FIX_KEY` files to a base key
pub fn adjust_key(base_key: u32, file_pos: u32, file_size: u32) -> u32 {
    base_key.wrapping_add(file_pos) ^ file_size
}

/// Undo [`adjust_key`], turning an effective key back into its base key
pub fn unadjust_key(key: u32, file_pos: u32, file_size: u32) -> u32 {
    (key ^ file_size).wrapping_sub(file_pos)
}
