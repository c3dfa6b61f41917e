//! File entries
//!
//! A [`FileEntry`] ties one hash table slot and one block table extent to the
//! bytes of a file. It does not own either slot: both tables stay with the
//! [`Archive`](crate::Archive), and an entry only records their indices.
//!
//! Reading a file runs decrypt then decompress; storing new contents runs
//! compress then encrypt. Both directions are driven by the flags of the
//! entry's extent.

use crate::compression::sector::{
    decode_sectors, decode_single_unit, encode_sectors, encode_single_unit, encode_uncompressed,
    recrypt,
};
use crate::compression::{CompressionMethod, SectorMode};
use crate::crypto::{adjust_key, file_key, recover_file_key, unadjust_key};
use crate::tables::{BlockEntry, MAX_FILE_SIZE};
use crate::{Error, Result};
use std::borrow::Cow;
use std::cell::{Cell, OnceCell};
use std::fmt;

/// Bytes held by an entry
pub(crate) enum EntryData<'a> {
    /// On-disk bytes, borrowed from the caller's buffer or copied
    Raw(Cow<'a, [u8]>),
    /// Read from the archive stream on every access
    Deferred,
}

impl fmt::Debug for EntryData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(Cow::Borrowed(bytes)) => write!(f, "Borrowed({} bytes)", bytes.len()),
            Self::Raw(Cow::Owned(bytes)) => write!(f, "Owned({} bytes)", bytes.len()),
            Self::Deferred => f.write_str("Deferred"),
        }
    }
}

/// A file stored in an archive
#[derive(Debug)]
pub struct FileEntry<'a> {
    name: OnceCell<String>,
    hash_index: usize,
    block_index: usize,
    data: EntryData<'a>,
    key: Cell<Option<u32>>,
}

impl<'a> FileEntry<'a> {
    pub(crate) fn new(hash_index: usize, block_index: usize, data: EntryData<'a>) -> Self {
        Self {
            name: OnceCell::new(),
            hash_index,
            block_index,
            data,
            key: Cell::new(None),
        }
    }

    /// Name of the file, if it has been learned
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Index of the hash table slot that names this file
    pub fn hash_index(&self) -> usize {
        self.hash_index
    }

    /// Index of the block table extent that describes this file
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    /// Key of sector 0, once it has been resolved
    pub fn key(&self) -> Option<u32> {
        self.key.get()
    }

    /// Whether the contents are read from the stream on demand
    pub fn is_deferred(&self) -> bool {
        matches!(self.data, EntryData::Deferred)
    }

    /// Record a name if none is known yet
    pub(crate) fn learn_name(&self, name: &str) {
        let _ = self.name.set(name.to_string());
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = OnceCell::from(name);
    }

    pub(crate) fn set_key(&self, key: u32) {
        self.key.set(Some(key));
    }

    pub(crate) fn set_hash_index(&mut self, index: usize) {
        self.hash_index = index;
    }

    pub(crate) fn set_block_index(&mut self, index: usize) {
        self.block_index = index;
    }

    /// On-disk bytes held in memory, if any
    pub(crate) fn raw(&self) -> Option<&[u8]> {
        match &self.data {
            EntryData::Raw(bytes) => Some(bytes),
            EntryData::Deferred => None,
        }
    }

    pub(crate) fn set_raw(&mut self, raw: Vec<u8>) {
        self.data = EntryData::Raw(Cow::Owned(raw));
    }

    /// Resolve the key of sector 0.
    ///
    /// Tries a key that is already known, then known-plaintext recovery for
    /// sectored compressed files, then the key derived from the name.
    pub(crate) fn resolve_key(
        &self,
        block: &BlockEntry,
        raw: &[u8],
        sector_size: usize,
    ) -> Result<u32> {
        if let Some(key) = self.key.get() {
            return Ok(key);
        }

        if block.is_compressed() && !block.is_single_unit() && block.file_size > 0 {
            match recover_file_key(raw, block.file_size, sector_size as u32) {
                Ok(key) => {
                    self.key.set(Some(key));
                    return Ok(key);
                }
                Err(_) => log::debug!(
                    "Key recovery failed for block {}, falling back to the name",
                    self.block_index
                ),
            }
        }

        let name = self.name().ok_or(Error::KeyNotFound { name: None })?;
        let mut key = file_key(name);
        if block.has_fix_key() {
            key = adjust_key(key, block.file_pos as u32, block.file_size);
        }
        self.key.set(Some(key));
        Ok(key)
    }

    /// Decrypt and decompress on-disk bytes
    pub(crate) fn decode(&self, block: &BlockEntry, raw: &[u8], sector_size: usize) -> Result<Vec<u8>> {
        let key = if block.is_encrypted() {
            Some(self.resolve_key(block, raw, sector_size).map_err(|e| self.name_error(e))?)
        } else {
            None
        };

        let mode = sector_mode(block);
        let file_size = block.file_size as usize;
        let data = if block.is_single_unit() {
            decode_single_unit(raw, file_size, mode, key)?
        } else {
            decode_sectors(raw, file_size, sector_size, mode, block.has_sector_crc(), key)?
        };

        log::trace!(
            "Decoded block {}: {} bytes on disk, {} plain",
            self.block_index,
            raw.len(),
            data.len()
        );
        Ok(data)
    }

    /// Encode new contents for this entry, updating `block` to match.
    ///
    /// Imploded files are rewritten with method tags and sector checksums
    /// are dropped. An encrypted entry uses the key derived from its name,
    /// or the key it was read with when the name is unknown; with neither
    /// the new contents are stored unencrypted.
    pub(crate) fn encode(
        &self,
        data: &[u8],
        block: &mut BlockEntry,
        method: Option<CompressionMethod>,
        sector_size: usize,
    ) -> Result<Vec<u8>> {
        if data.len() >= MAX_FILE_SIZE as usize {
            return Err(Error::CapacityExceeded(format!(
                "File of {} bytes is too large",
                data.len()
            )));
        }

        block.flags &= !(BlockEntry::FLAG_IMPLODE
            | BlockEntry::FLAG_FIX_KEY
            | BlockEntry::FLAG_SECTOR_CRC);
        if method.is_some() {
            block.flags |= BlockEntry::FLAG_COMPRESS;
        } else {
            block.flags &= !BlockEntry::FLAG_COMPRESS;
        }

        let key = if block.is_encrypted() {
            let key = self.name().map(file_key).or_else(|| self.key.get());
            if key.is_none() {
                log::warn!(
                    "No key for block {}, storing it unencrypted",
                    self.block_index
                );
                block.flags &= !BlockEntry::FLAG_ENCRYPTED;
            }
            key
        } else {
            None
        };

        let raw = if block.is_single_unit() {
            encode_single_unit(data, method, key)?
        } else if let Some(method) = method {
            encode_sectors(data, sector_size, method, key)?
        } else {
            encode_uncompressed(data, sector_size, key)
        };

        block.file_size = data.len() as u32;
        block.compressed_size = u32::try_from(raw.len())
            .map_err(|_| Error::CapacityExceeded("Encoded file exceeds 4 GiB".into()))?;
        self.key.set(key);
        Ok(raw)
    }

    /// Re-encrypt a `FIX_KEY` payload for a new position
    pub(crate) fn rekey(
        &self,
        block: &BlockEntry,
        raw: &mut [u8],
        new_pos: u32,
        sector_size: usize,
    ) -> Result<()> {
        let old_key = self
            .resolve_key(block, raw, sector_size)
            .map_err(|e| self.name_error(e))?;
        let base = unadjust_key(old_key, block.file_pos as u32, block.file_size);
        let new_key = adjust_key(base, new_pos, block.file_size);

        log::debug!(
            "Re-keying block {} from 0x{old_key:08X} to 0x{new_key:08X} for position 0x{new_pos:X}",
            self.block_index
        );
        recrypt(
            raw,
            block.file_size as usize,
            sector_size,
            sector_mode(block),
            block.is_single_unit(),
            block.has_sector_crc(),
            old_key,
            new_key,
        )
    }

    fn name_error(&self, error: Error) -> Error {
        match error {
            Error::KeyNotFound { name: None } => Error::KeyNotFound {
                name: self.name().map(str::to_string),
            },
            other => other,
        }
    }
}

/// How the sectors of an extent are compressed
pub(crate) fn sector_mode(block: &BlockEntry) -> SectorMode {
    if block.is_multi_compressed() {
        SectorMode::Tagged
    } else if block.is_imploded() {
        SectorMode::Imploded
    } else {
        SectorMode::Uncompressed
    }
}
