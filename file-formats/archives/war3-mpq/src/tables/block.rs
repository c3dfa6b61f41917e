//! Block table: the extents that locate and describe file payloads

use super::common::{ENTRY_SIZE, Shuffled, decrypt_table_data, encrypt_table_data, shuffle_in_place};
use super::hash::{HashEntry, HashTable};
use crate::crypto::BLOCK_TABLE_KEY;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use rand::Rng;

/// Declared plain sizes at or above this value mark a corrupt extent
pub const MAX_FILE_SIZE: u32 = 0x1000_0000;

/// One 16-byte extent record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockEntry {
    /// Payload offset from the MPQ header
    pub file_pos: i32,
    /// Payload length on disk
    pub compressed_size: u32,
    /// Length once decoded
    pub file_size: u32,
    /// `FLAG_*` bits
    pub flags: u32,
}

impl BlockEntry {
    /// Sectors are imploded, with no method tag
    pub const FLAG_IMPLODE: u32 = 0x0000_0100;
    /// Sectors carry a method tag
    pub const FLAG_COMPRESS: u32 = 0x0000_0200;
    /// Payload is enciphered
    pub const FLAG_ENCRYPTED: u32 = 0x0001_0000;
    /// Key depends on the payload offset
    pub const FLAG_FIX_KEY: u32 = 0x0002_0000;
    /// Patch payload
    pub const FLAG_PATCH_FILE: u32 = 0x0010_0000;
    /// One unit, no sector table
    pub const FLAG_SINGLE_UNIT: u32 = 0x0100_0000;
    /// Deletion marker
    pub const FLAG_DELETE_MARKER: u32 = 0x0200_0000;
    /// Sector table is followed by a checksum block
    pub const FLAG_SECTOR_CRC: u32 = 0x0400_0000;
    /// Extent is in use
    pub const FLAG_EXISTS: u32 = 0x8000_0000;

    /// A zeroed extent, used as a tombstone
    pub fn tombstone() -> Self {
        Self::default()
    }

    /// Either compression flag is set
    pub fn is_compressed(&self) -> bool {
        (self.flags & (Self::FLAG_IMPLODE | Self::FLAG_COMPRESS)) != 0
    }

    /// Sectors are tagged with their method
    pub fn is_multi_compressed(&self) -> bool {
        (self.flags & Self::FLAG_COMPRESS) != 0
    }

    /// Implode without the tagged scheme
    pub fn is_imploded(&self) -> bool {
        (self.flags & (Self::FLAG_IMPLODE | Self::FLAG_COMPRESS)) == Self::FLAG_IMPLODE
    }

    /// Payload is enciphered
    pub fn is_encrypted(&self) -> bool {
        (self.flags & Self::FLAG_ENCRYPTED) != 0
    }

    /// Payload is one unit
    pub fn is_single_unit(&self) -> bool {
        (self.flags & Self::FLAG_SINGLE_UNIT) != 0
    }

    /// A checksum block follows the sectors
    pub fn has_sector_crc(&self) -> bool {
        (self.flags & Self::FLAG_SECTOR_CRC) != 0
    }

    /// Check if the file exists
    pub fn exists(&self) -> bool {
        (self.flags & Self::FLAG_EXISTS) != 0
    }

    /// Check if the file uses fixed key encryption
    pub fn has_fix_key(&self) -> bool {
        (self.flags & Self::FLAG_FIX_KEY) != 0
    }

    /// Check if the file is a patch file
    pub fn is_patch_file(&self) -> bool {
        (self.flags & Self::FLAG_PATCH_FILE) != 0
    }

    /// Check whether a freshly parsed extent can be trusted
    pub fn is_plausible(&self) -> bool {
        self.exists() && self.file_size < MAX_FILE_SIZE
    }

    /// Read a block entry from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < ENTRY_SIZE {
            return Err(Error::invalid_format("Block entry too small"));
        }

        let mut cursor = data;
        Ok(Self {
            file_pos: cursor.read_i32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            file_size: cursor.read_u32::<LittleEndian>()?,
            flags: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Append the 16-byte record to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.file_pos.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.file_size.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
    }
}

/// Block table
#[derive(Debug, Clone, Default)]
pub struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    /// Create a new empty block table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table from already decoded entries
    pub fn from_entries(entries: Vec<BlockEntry>) -> Self {
        Self { entries }
    }

    /// Decrypt and parse an on-disk block table
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let raw = decrypt_table_data(data, BLOCK_TABLE_KEY);
        let entries = raw
            .chunks_exact(ENTRY_SIZE)
            .map(BlockEntry::from_bytes)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Serialize and encrypt the table
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * ENTRY_SIZE);
        for entry in &self.entries {
            entry.write_to(&mut out);
        }
        encrypt_table_data(&mut out, BLOCK_TABLE_KEY);
        out
    }

    /// Zero every extent that no live directory slot addresses, or whose
    /// flags and sizes are implausible. Directory slots pointing at a
    /// rejected extent become deletion markers.
    ///
    /// Returns the indices that were tombstoned.
    pub fn tombstone_unreferenced(&mut self, hash_table: &mut HashTable) -> Vec<usize> {
        let mut rejected = Vec::new();

        for (index, entry) in self.entries.iter_mut().enumerate() {
            if *entry == BlockEntry::tombstone() {
                continue;
            }
            let referenced = hash_table.addresses(index);
            if referenced && entry.is_plausible() {
                continue;
            }

            log::debug!(
                "Tombstoning block {index} (referenced: {referenced}, flags: 0x{:08X}, size: {})",
                entry.flags,
                entry.file_size
            );
            *entry = BlockEntry::tombstone();
            rejected.push(index);
        }

        for slot in hash_table.entries_mut() {
            if let Some(block) = slot.live_block_index() {
                let dangling = self.entries.get(block).is_none_or(|entry| !entry.exists());
                if dangling {
                    log::warn!("Hash slot addresses missing block {block}");
                    *slot = HashEntry::deleted();
                }
            }
        }

        rejected
    }

    /// Get all entries
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// Get a specific entry
    pub fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    /// Get a mutable reference to a specific entry
    pub fn get_mut(&mut self, index: usize) -> Option<&mut BlockEntry> {
        self.entries.get_mut(index)
    }

    /// Number of extents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table has no extents
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an extent, returning its index
    pub fn push(&mut self, entry: BlockEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Zero an extent in place
    pub fn tombstone(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = BlockEntry::tombstone();
        }
    }

    /// Randomly permute the extents, returning where each one moved
    pub(crate) fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R, iterations: usize) -> Shuffled {
        shuffle_in_place(&mut self.entries, rng, iterations)
    }

    /// Keep only the extents for which `keep` returns true
    pub(crate) fn retain<F: FnMut(&BlockEntry) -> bool>(&mut self, keep: F) {
        self.entries.retain(keep);
    }
}
