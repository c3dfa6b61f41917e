//! # war3_mpq - MPQ Archive Library
//!
//! Reads and writes version 1 MPQ archives as used by Warcraft III maps,
//! including archives that were deliberately damaged by map protection
//! tools.
//!
//! ## Features
//!
//! - Hash and block table parsing that tolerates masked block indices,
//!   duplicate names and bogus extents
//! - Per-sector Huffman, zlib, PKWare implode and IMA ADPCM codecs
//! - Recovery of file keys from ciphertext when the file name is unknown
//! - Insertion, removal, purging and shuffling of entries, then
//!   serialization back to bytes
//! - Zero-copy read-only access and stream-backed lazy access
//!
//! ## Examples
//!
//! ```
//! use war3_mpq::{Archive, OpenOptions};
//!
//! # fn main() -> Result<(), war3_mpq::Error> {
//! let mut archive = Archive::new();
//! archive.insert("war3map.j", b"function main takes nothing returns nothing")?;
//! let bytes = archive.serialize()?;
//!
//! let reopened = OpenOptions::new().read_only(true).open_bytes(&bytes)?;
//! let script = reopened.read_file("war3map.j")?;
//! assert!(script.starts_with(b"function main"));
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod archive;
pub mod compression;
pub mod crypto;
pub mod error;
pub mod file;
pub mod header;
pub mod io;
pub mod tables;

// Re-export commonly used types
pub use archive::{
    Archive, DEFAULT_SHUFFLE_ITERATIONS, InsertOptions, OpenOptions, ShuffleOptions,
};
pub use compression::{CompressionMethod, compress, decompress};
pub use crypto::{NameHash, decrypt_block, encrypt_block, hash_string, hash_type};
pub use error::{Error, ParseIssue, Result};
pub use file::FileEntry;
pub use header::{MapHeader, MpqHeader};
pub use io::ReadSeek;
pub use tables::{BlockEntry, BlockTable, HashEntry, HashTable, is_safe_index};

/// MPQ signature constants
pub mod signatures {
    /// Standard MPQ archive signature ('MPQ\x1A')
    pub const MPQ_ARCHIVE: u32 = 0x1A51504D;

    /// MPQ user data signature ('MPQ\x1B')
    pub const MPQ_USERDATA: u32 = 0x1B51504D;

    /// Warcraft III map header signature ('HM3W')
    pub const MAP_HEADER: u32 = 0x57334D48;
}

/// Sector size for a header's sector size shift
pub fn calculate_sector_size(sector_size_shift: u16) -> usize {
    512 << sector_size_shift
}
