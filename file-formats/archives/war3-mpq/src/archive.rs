//! MPQ archive handling
//!
//! An [`Archive`] owns the header, the hash table, the block table and the
//! list of [`FileEntry`] values that join them. Entries refer to table slots
//! by index only, so every operation that moves slots around (insert,
//! remove, purge, shuffle) repairs those indices itself.
//!
//! Opening an archive never fails because of a single bad file. Entries
//! whose sector tables are unreadable or whose keys cannot be recovered are
//! tombstoned and reported through [`Archive::issues`].

use crate::compression::CompressionMethod;
use crate::compression::sector::{first_offset, parse_offset_table, sector_count};
use crate::crypto::{NameHash, recover_file_key};
use crate::error::ParseIssue;
use crate::file::{EntryData, FileEntry};
use crate::header::{
    DEFAULT_SECTOR_SIZE_SHIFT, HEADER_SIZE, MAX_SECTOR_SIZE_SHIFT, MAX_TABLE_ENTRIES, MapHeader,
    MpqHeader,
};
use crate::io::ArchiveSource;
use crate::tables::{BlockEntry, BlockTable, ENTRY_SIZE, HashEntry, HashTable, shuffle_in_place};
use crate::{Error, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Default number of random transpositions applied by [`Archive::shuffle`]
pub const DEFAULT_SHUFFLE_ITERATIONS: usize = 0x8000;

/// Name of the file listing the archive's contents
pub const LISTFILE_NAME: &str = "(listfile)";

/// Options for opening an MPQ archive
///
/// ```no_run
/// use war3_mpq::OpenOptions;
///
/// # fn main() -> Result<(), war3_mpq::Error> {
/// let data = std::fs::read("protected.w3x")?;
/// let archive = OpenOptions::new()
///     .read_only(true)
///     .recover_keys(true)
///     .open_bytes(&data)?;
/// println!("{} files", archive.entries().count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    read_only: bool,
    stream_mode: bool,
    recover_keys: bool,
}

impl OpenOptions {
    /// Create new default options: writable, fully loaded, no key recovery
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the archive read-only.
    ///
    /// Entries of an archive opened from a byte slice then borrow from that
    /// slice instead of copying it, and every mutation fails with
    /// [`Error::AccessViolation`].
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Read file contents from the source on every access instead of
    /// loading them up front
    pub fn stream_mode(mut self, stream_mode: bool) -> Self {
        self.stream_mode = stream_mode;
        self
    }

    /// Recover the keys of encrypted compressed files while opening, so
    /// that their on-disk sizes can be recomputed from their sector tables
    pub fn recover_keys(mut self, recover_keys: bool) -> Self {
        self.recover_keys = recover_keys;
        self
    }

    /// Open an archive held in memory
    pub fn open_bytes(self, data: &[u8]) -> Result<Archive<'_>> {
        Archive::load(ArchiveSource::Borrowed(data), self)
    }

    /// Open an archive from a seekable reader.
    ///
    /// In stream mode the reader is kept and sought on every access;
    /// otherwise it is read to the end once.
    pub fn open_reader<'a, R: Read + Seek + 'a>(self, mut reader: R) -> Result<Archive<'a>> {
        if self.stream_mode {
            return Archive::load(ArchiveSource::stream(reader)?, self);
        }
        let mut data = Vec::new();
        reader.seek(SeekFrom::Start(0))?;
        reader.read_to_end(&mut data)?;
        Archive::load(ArchiveSource::Owned(data), self)
    }

    /// Open an archive file from disk
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Archive<'static>> {
        let file = File::open(path)?;
        self.open_reader(BufReader::new(file))
    }
}

/// Options for [`Archive::shuffle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleOptions {
    /// Number of random transpositions applied to each table
    pub iterations: usize,
    /// Seed for a reproducible shuffle; the thread RNG is used when `None`
    pub seed: Option<u64>,
}

impl ShuffleOptions {
    /// Default iterations with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_SHUFFLE_ITERATIONS,
            seed: None,
        }
    }
}

/// Options for [`Archive::insert_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOptions {
    /// Per-sector compression, or `None` to store sectors raw
    pub compression: Option<CompressionMethod>,
    /// Encrypt with the key derived from the file name
    pub encrypt: bool,
    /// Store the file as one unit instead of sectors
    pub single_unit: bool,
}

impl InsertOptions {
    /// Deflate-compressed, encrypted, sectored
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression method
    pub fn compression(mut self, compression: Option<CompressionMethod>) -> Self {
        self.compression = compression;
        self
    }

    /// Set whether the file is encrypted
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Set whether the file is stored as a single unit
    pub fn single_unit(mut self, single_unit: bool) -> Self {
        self.single_unit = single_unit;
        self
    }
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            compression: Some(CompressionMethod::Zlib),
            encrypt: true,
            single_unit: false,
        }
    }
}

/// An MPQ archive
#[derive(Debug)]
pub struct Archive<'a> {
    /// MPQ header
    header: MpqHeader,
    /// Warcraft III map header in front of the archive
    map_header: Option<MapHeader>,
    /// Offset where the MPQ header starts in the source
    archive_offset: u64,
    hash_table: HashTable,
    block_table: BlockTable,
    entries: Vec<FileEntry<'a>>,
    /// Backing bytes for entries that are read on demand
    source: ArchiveSource<'a>,
    read_only: bool,
    issues: Vec<ParseIssue>,
}

impl Archive<'static> {
    /// Create an empty archive with 4096-byte sectors
    pub fn new() -> Self {
        Self::empty(MpqHeader::new(DEFAULT_SECTOR_SIZE_SHIFT))
    }

    /// Create an empty archive with sectors of `512 << shift` bytes
    pub fn with_sector_size_shift(shift: u16) -> Result<Self> {
        if shift > MAX_SECTOR_SIZE_SHIFT {
            return Err(Error::invalid_format(format!(
                "Sector size shift {shift} is out of range"
            )));
        }
        Ok(Self::empty(MpqHeader::new(shift)))
    }

    /// Open an existing archive file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    fn empty(header: MpqHeader) -> Self {
        Self {
            header,
            map_header: None,
            archive_offset: 0,
            hash_table: HashTable::new(),
            block_table: BlockTable::new(),
            entries: Vec::new(),
            source: ArchiveSource::Empty,
            read_only: false,
            issues: Vec::new(),
        }
    }
}

impl Default for Archive<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Archive<'a> {
    /// Open a writable archive held in memory
    pub fn open_bytes(data: &'a [u8]) -> Result<Self> {
        OpenOptions::new().open_bytes(data)
    }

    fn load(source: ArchiveSource<'a>, options: OpenOptions) -> Result<Self> {
        let location = source.find_header()?;
        let base = location.offset;
        let header = location.header;

        let hash_data = read_table(
            &source,
            base,
            header.hash_table_pos,
            header.hash_table_size,
            "Hash",
        )?;
        let block_data = read_table(
            &source,
            base,
            header.block_table_pos,
            header.block_table_size,
            "Block",
        )?;
        let mut hash_table = HashTable::from_bytes(&hash_data)?;
        let mut block_table = BlockTable::from_bytes(&block_data)?;
        let rejected = block_table.tombstone_unreferenced(&mut hash_table);

        log::debug!(
            "Loaded {} hash slots and {} extents, {} extents rejected",
            hash_table.len(),
            block_table.len(),
            rejected.len()
        );

        let mut archive = Self {
            header,
            map_header: location.map_header,
            archive_offset: base,
            hash_table,
            block_table,
            entries: Vec::new(),
            source,
            read_only: options.read_only,
            issues: Vec::new(),
        };

        for block_index in 0..archive.block_table.len() {
            let Some(block) = archive.block_table.get(block_index).copied() else {
                continue;
            };
            if !block.exists() {
                continue;
            }
            let Some(hash_index) = archive.hash_table.find_by_block(block_index) else {
                continue;
            };

            match archive.load_entry(hash_index, block_index, block, options) {
                Ok(entry) => archive.entries.push(entry),
                Err(error) => {
                    log::warn!("Tombstoning block {block_index}: {error}");
                    archive.drop_block(block_index);
                    archive.issues.push(ParseIssue {
                        block_index,
                        hash_index: Some(hash_index),
                        error,
                    });
                }
            }
        }

        if !options.stream_mode {
            archive.source = ArchiveSource::Empty;
        }

        log::debug!(
            "Opened archive at 0x{base:X} with {} files and {} issues",
            archive.entries.len(),
            archive.issues.len()
        );
        Ok(archive)
    }

    fn load_entry(
        &mut self,
        hash_index: usize,
        block_index: usize,
        mut block: BlockEntry,
        options: OpenOptions,
    ) -> Result<FileEntry<'a>> {
        let pos = self.payload_offset(&block)?;
        let sector_size = self.header.sector_size();
        let mut recovered = None;

        let has_table = block.is_compressed() && !block.is_single_unit() && block.file_size > 0;
        if has_table && (!block.is_encrypted() || options.recover_keys) {
            if block.is_encrypted() {
                let head = self.source.read_at(pos, 8)?;
                recovered = Some(recover_file_key(&head, block.file_size, sector_size as u32)?);
            }

            let table_len = first_offset(self.source.read_u32_at(pos)?, recovered) as usize;
            let limit = (sector_count(block.file_size as usize, sector_size) + 2) * 4;
            if table_len < 8 || table_len > limit || table_len % 4 != 0 {
                return Err(Error::invalid_format(format!(
                    "Sector table of block {block_index} declares {table_len} bytes"
                )));
            }

            let table = self.source.read_at(pos, table_len)?;
            let offsets = parse_offset_table(&table, recovered);
            let end = offsets.last().copied().unwrap_or_default();
            if end != block.compressed_size {
                log::debug!(
                    "Block {block_index} declares {} bytes on disk, its sector table ends at {end}",
                    block.compressed_size
                );
                block.compressed_size = end;
                if let Some(stored) = self.block_table.get_mut(block_index) {
                    stored.compressed_size = end;
                }
            }
        }

        let len = block.compressed_size as usize;
        let data = if options.stream_mode {
            if pos.saturating_add(len as u64) > self.source.len() {
                return Err(Error::invalid_format(format!(
                    "Block {block_index} runs past the end of the archive"
                )));
            }
            EntryData::Deferred
        } else {
            let raw = self.source.read_at(pos, len)?;
            if options.read_only {
                EntryData::Raw(raw)
            } else {
                EntryData::Raw(Cow::Owned(raw.into_owned()))
            }
        };

        let entry = FileEntry::new(hash_index, block_index, data);
        if let Some(key) = recovered {
            entry.set_key(key);
        }
        Ok(entry)
    }

    /// Absolute offset of an extent's payload in the source
    fn payload_offset(&self, block: &BlockEntry) -> Result<u64> {
        let pos = self.archive_offset as i64 + i64::from(block.file_pos);
        u64::try_from(pos).map_err(|_| {
            Error::invalid_format(format!("File position {} lies before the archive", block.file_pos))
        })
    }

    /// Tombstone an extent and delete every slot addressing it
    fn drop_block(&mut self, block_index: usize) {
        self.block_table.tombstone(block_index);
        let slots: Vec<usize> = self
            .hash_table
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.live_block_index() == Some(block_index))
            .map(|(index, _)| index)
            .collect();
        for slot in slots {
            self.hash_table.remove(slot);
        }
        self.entries.retain(|entry| entry.block_index() != block_index);
    }

    /// Get the archive header
    pub fn header(&self) -> &MpqHeader {
        &self.header
    }

    /// Get the Warcraft III map header, if the archive has one
    pub fn map_header(&self) -> Option<&MapHeader> {
        self.map_header.as_ref()
    }

    /// Replace or remove the map header written in front of the archive
    pub fn set_map_header(&mut self, map_header: Option<MapHeader>) -> Result<()> {
        self.ensure_writable()?;
        self.map_header = map_header;
        Ok(())
    }

    /// Offset of the MPQ header in the source it was opened from
    pub fn archive_offset(&self) -> u64 {
        self.archive_offset
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> usize {
        self.header.sector_size()
    }

    /// Get the hash table
    pub fn hash_table(&self) -> &HashTable {
        &self.hash_table
    }

    /// Get the block table
    pub fn block_table(&self) -> &BlockTable {
        &self.block_table
    }

    /// Whether mutations are refused
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Entries rejected while opening
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    /// Iterate over all files
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry<'a>> {
        self.entries.iter()
    }

    /// Iterate over the names learned so far
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(FileEntry::name)
    }

    /// Find a file by name.
    ///
    /// The name is remembered by the entry, so a later read can derive the
    /// key from it.
    pub fn find(&self, name: &str) -> Option<&FileEntry<'a>> {
        let entry = self.find_hash(NameHash::new(name))?;
        entry.learn_name(name);
        Some(entry)
    }

    /// Find a file by its name hashes
    pub fn find_hash(&self, hash: NameHash) -> Option<&FileEntry<'a>> {
        self.position_of(hash).map(|position| &self.entries[position])
    }

    /// Check whether a file exists
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn position_of(&self, hash: NameHash) -> Option<usize> {
        let slot = self.hash_table.find(hash)?;
        let block = self.hash_table.get(slot)?.live_block_index()?;
        self.entries
            .iter()
            .position(|entry| entry.block_index() == block)
    }

    fn block_of(&self, entry: &FileEntry<'a>) -> Result<BlockEntry> {
        self.block_table
            .get(entry.block_index())
            .copied()
            .ok_or_else(|| {
                Error::block_table(format!("Block {} does not exist", entry.block_index()))
            })
    }

    fn raw_bytes<'b>(&'b self, entry: &'b FileEntry<'a>) -> Result<Cow<'b, [u8]>> {
        if let Some(raw) = entry.raw() {
            return Ok(Cow::Borrowed(raw));
        }
        let block = self.block_of(entry)?;
        let pos = self.payload_offset(&block)?;
        Ok(self.source.read_at(pos, block.compressed_size as usize)?)
    }

    /// Read and decode a file
    pub fn read(&self, entry: &FileEntry<'a>) -> Result<Vec<u8>> {
        let block = self.block_of(entry)?;
        let raw = self.raw_bytes(entry)?;
        entry.decode(&block, &raw, self.sector_size())
    }

    /// Read and decode a file by name
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        self.read(entry)
    }

    /// Get the on-disk bytes of a file, still compressed and encrypted
    pub fn read_raw(&self, entry: &FileEntry<'a>) -> Result<Vec<u8>> {
        Ok(self.raw_bytes(entry)?.into_owned())
    }

    /// Resolve the key of sector 0 of an encrypted file
    pub fn file_key(&self, entry: &FileEntry<'a>) -> Result<u32> {
        let block = self.block_of(entry)?;
        let raw = self.raw_bytes(entry)?;
        entry.resolve_key(&block, &raw, self.sector_size())
    }

    /// Attach a name to the file stored in `block_index`.
    ///
    /// The name must hash to the entry's directory slot. Allowed on
    /// read-only archives.
    pub fn set_name(&mut self, block_index: usize, name: &str) -> Result<()> {
        let hash = NameHash::new(name);
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.block_index() == block_index)
            .ok_or_else(|| Error::block_table(format!("No file in block {block_index}")))?;
        let slot = self.hash_table.get(entry.hash_index()).copied();
        if slot.is_none_or(|slot| slot.name_hash() != hash) {
            return Err(Error::hash_table(format!(
                "{name} does not match the slot of block {block_index}"
            )));
        }
        entry.set_name(name.to_string());
        Ok(())
    }

    /// Learn names from a list, returning how many matched a file
    pub fn apply_names<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| self.find(name.as_ref()).is_some())
            .count()
    }

    /// Learn names from the archive's own `(listfile)`.
    ///
    /// Returns how many names matched a file; an archive without a listfile
    /// yields 0.
    pub fn load_listfile(&self) -> Result<usize> {
        if !self.contains(LISTFILE_NAME) {
            return Ok(0);
        }
        let data = self.read_file(LISTFILE_NAME)?;
        let text = String::from_utf8_lossy(&data);
        let names = text
            .split(['\r', '\n', ';'])
            .map(str::trim)
            .filter(|name| !name.is_empty());
        Ok(self.apply_names(names))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::AccessViolation)
        } else {
            Ok(())
        }
    }

    /// Add a file with default options, replacing any file of that name
    pub fn insert(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.insert_with(name, data, InsertOptions::default())
    }

    /// Add a file, replacing any file of that name.
    ///
    /// The first tombstoned extent that no slot addresses is reused before
    /// the block table grows, and the first free directory slot is reused
    /// before the hash table grows. A failed insert leaves the archive
    /// unchanged.
    pub fn insert_with(&mut self, name: &str, data: &[u8], options: InsertOptions) -> Result<()> {
        self.ensure_writable()?;
        let hash = NameHash::new(name);
        let replacing = self.hash_table.find(hash).is_some();

        if !replacing {
            let has_free_block = (0..self.block_table.len()).any(|index| self.reusable_block(index));
            if !has_free_block && self.block_table.len() >= MAX_TABLE_ENTRIES as usize {
                return Err(Error::CapacityExceeded(format!(
                    "Block table is full with {MAX_TABLE_ENTRIES} entries"
                )));
            }
            let has_free_slot = self.hash_table.entries().iter().any(HashEntry::is_free);
            if !has_free_slot && self.hash_table.len() >= MAX_TABLE_ENTRIES as usize {
                return Err(Error::CapacityExceeded(format!(
                    "Hash table is full with {MAX_TABLE_ENTRIES} entries"
                )));
            }
        }

        let mut block = BlockEntry {
            flags: BlockEntry::FLAG_EXISTS,
            ..BlockEntry::default()
        };
        if options.encrypt {
            block.flags |= BlockEntry::FLAG_ENCRYPTED;
        }
        if options.single_unit {
            block.flags |= BlockEntry::FLAG_SINGLE_UNIT;
        }

        let mut entry = FileEntry::new(0, 0, EntryData::Deferred);
        entry.learn_name(name);
        let raw = entry.encode(data, &mut block, options.compression, self.sector_size())?;

        if replacing {
            self.remove_hash(hash)?;
        }
        let block_index = (0..self.block_table.len())
            .find(|&index| self.reusable_block(index))
            .unwrap_or(self.block_table.len());
        match self.block_table.get_mut(block_index) {
            Some(stored) => *stored = block,
            None => {
                self.block_table.push(block);
            }
        }
        let hash_index = self.hash_table.insert(hash, block_index as u32);
        entry.set_block_index(block_index);
        entry.set_hash_index(hash_index);
        entry.set_raw(raw);
        self.entries.push(entry);

        log::debug!(
            "Inserted {name} ({} bytes) at slot {hash_index}, block {block_index}",
            data.len()
        );
        Ok(())
    }

    /// A tombstoned extent that no slot addresses
    fn reusable_block(&self, index: usize) -> bool {
        self.block_table.get(index) == Some(&BlockEntry::tombstone())
            && !self.hash_table.addresses(index)
    }

    /// Replace the contents of an existing file, keeping its flags
    pub fn set_plaintext(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let position = self
            .position_of(NameHash::new(name))
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        let sector_size = self.sector_size();

        let entry = &self.entries[position];
        entry.learn_name(name);
        let mut block = self.block_of(entry)?;
        let method = block.is_compressed().then_some(CompressionMethod::Zlib);
        let raw = entry.encode(data, &mut block, method, sector_size)?;

        let block_index = entry.block_index();
        if let Some(stored) = self.block_table.get_mut(block_index) {
            *stored = block;
        }
        self.entries[position].set_raw(raw);
        Ok(())
    }

    /// Remove a file by name
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.ensure_writable()?;
        let hash = NameHash::new(name);
        if self.hash_table.find(hash).is_none() {
            return Err(Error::FileNotFound(name.to_string()));
        }
        self.remove_hash(hash)
    }

    /// Remove a file by its name hashes.
    ///
    /// The extent is zeroed and every slot addressing it becomes a deletion
    /// marker; neither table shrinks.
    pub fn remove_hash(&mut self, hash: NameHash) -> Result<()> {
        self.ensure_writable()?;
        let block_index = self
            .hash_table
            .find(hash)
            .and_then(|slot| self.hash_table.get(slot))
            .and_then(HashEntry::live_block_index)
            .ok_or_else(|| {
                Error::FileNotFound(format!("{:08X}:{:08X}", hash.name_a, hash.name_b))
            })?;

        self.drop_block(block_index);
        log::debug!("Removed block {block_index}");
        Ok(())
    }

    /// Drop every extent that does not exist and renumber the rest.
    ///
    /// With `remove_orphan_hashes`, directory slots that are not live or
    /// point past the block table are dropped too, and the locale and
    /// platform of the remaining slots are cleared.
    pub fn purge(&mut self, remove_orphan_hashes: bool) -> Result<()> {
        self.ensure_writable()?;

        let mut next = 0;
        let remap: Vec<Option<usize>> = self
            .block_table
            .entries()
            .iter()
            .map(|block| {
                block.exists().then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        let before = self.block_table.len();
        self.block_table.retain(BlockEntry::exists);

        for slot in self.hash_table.entries_mut() {
            if let Some(block) = slot.live_block_index() {
                match remap.get(block).copied().flatten() {
                    Some(new) => slot.block_index = new as u32,
                    None => *slot = HashEntry::deleted(),
                }
            }
        }

        if remove_orphan_hashes {
            let blocks = self.block_table.len();
            self.hash_table
                .retain(|slot| slot.live_block_index().is_some_and(|block| block < blocks));
            for slot in self.hash_table.entries_mut() {
                slot.locale = 0;
                slot.platform = 0;
            }
        }

        for entry in &mut self.entries {
            if let Some(new) = remap.get(entry.block_index()).copied().flatten() {
                entry.set_block_index(new);
            }
            if let Some(slot) = self.hash_table.find_by_block(entry.block_index()) {
                entry.set_hash_index(slot);
            }
        }

        log::debug!(
            "Purged {} extents, {} hash slots remain",
            before - self.block_table.len(),
            self.hash_table.len()
        );
        Ok(())
    }

    /// Randomly permute the hash table, the block table and the entry list,
    /// keeping every name resolvable
    pub fn shuffle(&mut self, options: ShuffleOptions) -> Result<()> {
        self.ensure_writable()?;
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let slots = self.hash_table.shuffle(&mut rng, options.iterations);
        for entry in &mut self.entries {
            entry.set_hash_index(slots.map(entry.hash_index()));
        }

        let blocks = self.block_table.shuffle(&mut rng, options.iterations);
        self.hash_table.remap_blocks(&blocks);
        for entry in &mut self.entries {
            entry.set_block_index(blocks.map(entry.block_index()));
        }

        shuffle_in_place(&mut self.entries, &mut rng, options.iterations);
        log::debug!("Shuffled with {} iterations", options.iterations);
        Ok(())
    }

    /// Serialize the archive.
    ///
    /// File payloads are laid out first, in entry order, right after the
    /// header. `FIX_KEY` files that move are re-encrypted for their new
    /// position. The hash table and the block table follow, then the header
    /// is filled in. A map header, if any, is written in front.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let sector_size = self.sector_size();
        let mut block_table = self.block_table.clone();
        let mut body = vec![0u8; HEADER_SIZE as usize];

        for entry in &self.entries {
            let block = self.block_of(entry)?;
            let mut raw = self.raw_bytes(entry)?.into_owned();
            let new_pos = i32::try_from(body.len())
                .map_err(|_| Error::CapacityExceeded("Archive exceeds 2 GiB".into()))?;

            if block.is_encrypted() && block.has_fix_key() && block.file_pos != new_pos {
                entry.rekey(&block, &mut raw, new_pos as u32, sector_size)?;
            }

            if let Some(stored) = block_table.get_mut(entry.block_index()) {
                stored.file_pos = new_pos;
                stored.compressed_size = raw.len() as u32;
            }
            body.extend_from_slice(&raw);
        }

        if self.hash_table.len() > MAX_TABLE_ENTRIES as usize
            || block_table.len() > MAX_TABLE_ENTRIES as usize
        {
            return Err(Error::CapacityExceeded(format!(
                "Tables hold {} hash and {} block entries",
                self.hash_table.len(),
                block_table.len()
            )));
        }

        let hash_table_pos = body.len();
        body.extend_from_slice(&self.hash_table.to_bytes());
        let block_table_pos = body.len();
        body.extend_from_slice(&block_table.to_bytes());

        let archive_size = u32::try_from(body.len())
            .map_err(|_| Error::CapacityExceeded("Archive exceeds 4 GiB".into()))?;
        let header = MpqHeader {
            header_size: HEADER_SIZE,
            archive_size,
            format_version: self.header.format_version,
            sector_size_shift: self.header.sector_size_shift,
            hash_table_pos: hash_table_pos as i32,
            block_table_pos: block_table_pos as i32,
            hash_table_size: self.hash_table.len() as u32,
            block_table_size: block_table.len() as u32,
        };
        body[..HEADER_SIZE as usize].copy_from_slice(&header.to_bytes());

        log::debug!(
            "Serialized {} files into {archive_size} bytes",
            self.entries.len()
        );

        match &self.map_header {
            Some(map_header) => {
                let mut output = map_header.to_bytes();
                output.extend_from_slice(&body);
                Ok(output)
            }
            None => Ok(body),
        }
    }

    /// Serialize the archive into a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.serialize()?)?;
        Ok(())
    }

    /// Serialize the archive to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.serialize()?)?;
        Ok(())
    }
}

/// Read an on-disk table, keeping whatever part of it the source holds
fn read_table(
    source: &ArchiveSource<'_>,
    base: u64,
    pos: i32,
    count: u32,
    what: &str,
) -> Result<Vec<u8>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let offset = u64::try_from(base as i64 + i64::from(pos))
        .ok()
        .filter(|&offset| offset <= source.len())
        .ok_or_else(|| {
            Error::invalid_format(format!("{what} table at {pos} lies outside the archive"))
        })?;

    let wanted = u64::from(count) * ENTRY_SIZE as u64;
    let available = (source.len() - offset) / ENTRY_SIZE as u64 * ENTRY_SIZE as u64;
    let len = wanted.min(available);
    if len < wanted {
        log::warn!("{what} table truncated: {len} of {wanted} bytes present");
    }

    Ok(source.read_at(offset, len as usize)?.into_owned())
}
