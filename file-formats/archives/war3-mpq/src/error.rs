//! Errors raised while reading, editing and writing archives

use std::io;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong with an archive
#[derive(Error, Debug)]
pub enum Error {
    /// Failure of the underlying reader or writer
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// Malformed header, table or payload
    #[error("Malformed archive: {0}")]
    InvalidFormat(String),

    /// Mutation attempted on an archive opened read-only
    #[error("Archive was opened read-only")]
    AccessViolation,

    /// An encrypted file whose key is neither known nor recoverable
    #[error("No key for encrypted file{}", key_owner(.name))]
    KeyNotFound {
        /// Name of the file, when known
        name: Option<String>,
    },

    /// Block index that stays out of range after masking protection bits
    #[error("Block index 0x{0:08X} is out of range")]
    IndexCorruption(u32),

    /// Lookup of a name that no live slot carries
    #[error("No file named {0}")]
    FileNotFound(String),

    /// Inconsistent directory slot
    #[error("Hash table: {0}")]
    HashTable(String),

    /// Missing or inconsistent extent
    #[error("Block table: {0}")]
    BlockTable(String),

    /// Cipher or key derivation failure
    #[error("Cipher: {0}")]
    Crypto(String),

    /// A sector that could not be compressed or expanded
    #[error("Sector codec: {0}")]
    Compression(String),

    /// Tables or payloads past what the format can address
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
}

/// A per-entry failure recorded while opening an archive.
///
/// The offending extent is tombstoned and the rest of the archive loads.
#[derive(Debug)]
pub struct ParseIssue {
    /// Block table index of the rejected extent
    pub block_index: usize,
    /// Hash table slot that addressed it, if any
    pub hash_index: Option<usize>,
    /// What went wrong
    pub error: Error,
}

fn key_owner(name: &Option<String>) -> String {
    name.as_deref()
        .map_or_else(String::new, |name| format!(" {name}"))
}

impl Error {
    /// Shorthand for [`Error::InvalidFormat`]
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Shorthand for [`Error::Crypto`]
    pub fn crypto<S: Into<String>>(msg: S) -> Self {
        Self::Crypto(msg.into())
    }

    /// Shorthand for [`Error::Compression`]
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Shorthand for [`Error::HashTable`]
    pub fn hash_table<S: Into<String>>(msg: S) -> Self {
        Self::HashTable(msg.into())
    }

    /// Shorthand for [`Error::BlockTable`]
    pub fn block_table<S: Into<String>>(msg: S) -> Self {
        Self::BlockTable(msg.into())
    }

    /// Whether the error comes from damaged archive contents
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_)
                | Self::IndexCorruption(_)
                | Self::HashTable(_)
                | Self::BlockTable(_)
                | Self::Compression(_)
        )
    }

    /// Whether the archive stays usable after the error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::AccessViolation | Self::KeyNotFound { .. }
        )
    }
}
