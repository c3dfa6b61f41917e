//! Hash table implementation for MPQ archives
//!
//! Lookups scan the whole table and return the last live slot whose name
//! hashes match, so slot position carries no addressing meaning. Shuffling
//! and compaction are therefore free to move slots around.

use super::common::{ENTRY_SIZE, Shuffled, decrypt_table_data, encrypt_table_data, shuffle_in_place};
use crate::crypto::{HASH_TABLE_KEY, NameHash};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use rand::Rng;
use std::collections::HashMap;

/// Block indices at or above this value are never trusted
pub const MAX_BLOCK_INDEX: u32 = 0x8000;

/// Clear the high bits that map protectors set on block indices
pub fn mask_block_index(block_index: u32) -> u32 {
    let mut index = block_index;
    if index & 0x8000_0000 != 0 {
        index &= !0x8000_0000;
    }
    if index & 0x4000_0000 != 0 {
        index &= !0x4000_0000;
    }
    index
}

/// Check whether a block index is usable once protection bits are masked
pub fn is_safe_index(block_index: u32) -> bool {
    mask_block_index(block_index) < MAX_BLOCK_INDEX
}

/// Hash table entry (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEntry {
    /// The hash of the full file name (part A)
    pub name_a: u32,
    /// The hash of the full file name (part B)
    pub name_b: u32,
    /// The language of the file (Windows LANGID)
    pub locale: u16,
    /// The platform the file is used for
    pub platform: u16,
    /// Block table index or special value
    pub block_index: u32,
}

impl HashEntry {
    /// Value indicating the hash entry has never been used
    pub const EMPTY_NEVER_USED: u32 = 0xFFFF_FFFF;
    /// Value indicating the hash entry was deleted
    pub const EMPTY_DELETED: u32 = 0xFFFF_FFFE;

    /// Create an empty, never used hash entry
    pub fn empty() -> Self {
        Self {
            name_a: u32::MAX,
            name_b: u32::MAX,
            locale: u16::MAX,
            platform: u16::MAX,
            block_index: Self::EMPTY_NEVER_USED,
        }
    }

    /// Create a deletion marker
    pub fn deleted() -> Self {
        Self {
            block_index: Self::EMPTY_DELETED,
            ..Self::empty()
        }
    }

    /// Create a live entry
    pub fn new(hash: NameHash, block_index: u32) -> Self {
        Self {
            name_a: hash.name_a,
            name_b: hash.name_b,
            locale: 0,
            platform: 0,
            block_index,
        }
    }

    /// Check if this entry has never been used
    pub fn is_empty(&self) -> bool {
        self.block_index == Self::EMPTY_NEVER_USED
    }

    /// Check if this entry was deleted
    pub fn is_deleted(&self) -> bool {
        self.block_index == Self::EMPTY_DELETED
    }

    /// Check if this slot may be overwritten by an insertion
    pub fn is_free(&self) -> bool {
        self.is_empty() || self.is_deleted()
    }

    /// A slot is live when it carries a name and a safe block index
    pub fn is_live(&self) -> bool {
        !(self.name_a == u32::MAX && self.name_b == u32::MAX) && is_safe_index(self.block_index)
    }

    /// The two-part name hash stored in this slot
    pub fn name_hash(&self) -> NameHash {
        NameHash::from_parts(self.name_a, self.name_b)
    }

    /// Block index of a live slot, protection bits masked
    pub fn live_block_index(&self) -> Option<usize> {
        self.is_live()
            .then(|| mask_block_index(self.block_index) as usize)
    }

    /// Read a hash entry from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < ENTRY_SIZE {
            return Err(Error::invalid_format("Hash entry too small"));
        }

        let mut cursor = data;
        Ok(Self {
            name_a: cursor.read_u32::<LittleEndian>()?,
            name_b: cursor.read_u32::<LittleEndian>()?,
            locale: cursor.read_u16::<LittleEndian>()?,
            platform: cursor.read_u16::<LittleEndian>()?,
            block_index: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Append the 16-byte record to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name_a.to_le_bytes());
        out.extend_from_slice(&self.name_b.to_le_bytes());
        out.extend_from_slice(&self.locale.to_le_bytes());
        out.extend_from_slice(&self.platform.to_le_bytes());
        out.extend_from_slice(&self.block_index.to_le_bytes());
    }
}

/// Hash table
#[derive(Debug, Clone, Default)]
pub struct HashTable {
    entries: Vec<HashEntry>,
}

impl HashTable {
    /// Create a new empty hash table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table from already decoded entries
    pub fn from_entries(entries: Vec<HashEntry>) -> Self {
        Self { entries }
    }

    /// Decrypt and parse an on-disk hash table.
    ///
    /// A later live slot with the same name hashes as an earlier one shadows
    /// it: the earlier slot is reset to the never-used sentinel. Live slots
    /// keep their block index with protection bits masked.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let raw = decrypt_table_data(data, HASH_TABLE_KEY);

        let mut entries = Vec::with_capacity(raw.len() / ENTRY_SIZE);
        let mut seen: HashMap<NameHash, usize> = HashMap::new();

        for record in raw.chunks_exact(ENTRY_SIZE) {
            let mut entry = HashEntry::from_bytes(record)?;
            let index = entries.len();

            if entry.is_live() {
                entry.block_index = mask_block_index(entry.block_index);
                if let Some(previous) = seen.insert(entry.name_hash(), index) {
                    log::warn!(
                        "Hash slot {index} shadows slot {previous} with the same name hash"
                    );
                    entries[previous] = HashEntry::empty();
                }
            } else if !entry.is_free() {
                log::warn!(
                    "Hash slot {index} has unsafe block index 0x{:08X}",
                    entry.block_index
                );
            }

            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Serialize and encrypt the table
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * ENTRY_SIZE);
        for entry in &self.entries {
            entry.write_to(&mut out);
        }
        encrypt_table_data(&mut out, HASH_TABLE_KEY);
        out
    }

    /// Get all entries
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    /// Get a specific entry
    pub fn get(&self, index: usize) -> Option<&HashEntry> {
        self.entries.get(index)
    }

    /// Get a mutable reference to a specific entry
    pub fn get_mut(&mut self, index: usize) -> Option<&mut HashEntry> {
        self.entries.get_mut(index)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table has no slots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the last live slot matching both name hashes
    pub fn find(&self, hash: NameHash) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.is_live() && entry.name_hash() == hash)
    }

    /// Find the last live slot that addresses a block
    pub fn find_by_block(&self, block_index: usize) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.live_block_index() == Some(block_index))
    }

    /// Check whether any live slot addresses a block
    pub fn addresses(&self, block_index: usize) -> bool {
        self.find_by_block(block_index).is_some()
    }

    /// Store a name in the first free slot, appending one if none is free.
    ///
    /// Returns the index of the slot used.
    pub fn insert(&mut self, hash: NameHash, block_index: u32) -> usize {
        let entry = HashEntry::new(hash, block_index);
        match self.entries.iter().position(HashEntry::is_free) {
            Some(index) => {
                self.entries[index] = entry;
                index
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        }
    }

    /// Turn a slot into a deletion marker
    pub fn remove(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = HashEntry::deleted();
        }
    }

    /// Randomly permute the slots, returning where each slot moved
    pub(crate) fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R, iterations: usize) -> Shuffled {
        shuffle_in_place(&mut self.entries, rng, iterations)
    }

    /// Point every live slot at the block its old index maps to
    pub(crate) fn remap_blocks(&mut self, shuffled: &Shuffled) {
        for entry in &mut self.entries {
            if let Some(block) = entry.live_block_index() {
                entry.block_index = shuffled.map(block) as u32;
            }
        }
    }

    /// Keep only the slots for which `keep` returns true
    pub(crate) fn retain<F: FnMut(&HashEntry) -> bool>(&mut self, keep: F) {
        self.entries.retain(keep);
    }

    /// Mutable access to all slots
    pub(crate) fn entries_mut(&mut self) -> &mut [HashEntry] {
        &mut self.entries
    }
}
