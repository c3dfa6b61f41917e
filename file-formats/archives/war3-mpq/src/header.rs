//! MPQ header structures and parsing
//!
//! Besides the 32-byte MPQ header itself this module knows two records that
//! may precede it: the `MPQ\x1B` user-data header, which points at the real
//! header, and the Warcraft III `HM3W` map header, which is kept as an opaque
//! record and written back unchanged.

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::borrow::Cow;
use std::io::{Read, Seek, SeekFrom, Write};

/// MPQ archive header signature ('MPQ\x1A')
pub const MPQ_HEADER_SIGNATURE: u32 = 0x1A51_504D;

/// MPQ user data header signature ('MPQ\x1B')
pub const MPQ_USERDATA_SIGNATURE: u32 = 0x1B51_504D;

/// Warcraft III map header signature ('HM3W')
pub const MAP_HEADER_SIGNATURE: u32 = 0x5733_4D48;

/// Header alignment requirement (512 bytes)
pub const HEADER_ALIGNMENT: u64 = 0x200;

/// Size of the version 1 header
pub const HEADER_SIZE: u32 = 0x20;

/// Upper bound applied to both declared table sizes
pub const MAX_TABLE_ENTRIES: u32 = 0x8000;

/// Largest sector size shift accepted when parsing
pub const MAX_SECTOR_SIZE_SHIFT: u16 = 22;

/// Default sector size shift (4096-byte sectors)
pub const DEFAULT_SECTOR_SIZE_SHIFT: u16 = 3;

/// Main MPQ header structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpqHeader {
    /// Size of the archive header
    pub header_size: u32,
    /// Size of the MPQ archive
    pub archive_size: u32,
    /// Format version
    pub format_version: u16,
    /// Sector size as a power of two exponent over 512
    pub sector_size_shift: u16,
    /// Offset to the hash table, relative to the header
    pub hash_table_pos: i32,
    /// Offset to the block table, relative to the header
    pub block_table_pos: i32,
    /// Number of entries in the hash table
    pub hash_table_size: u32,
    /// Number of entries in the block table
    pub block_table_size: u32,
}

impl MpqHeader {
    /// Create a header for an empty archive
    pub fn new(sector_size_shift: u16) -> Self {
        Self {
            header_size: HEADER_SIZE,
            archive_size: HEADER_SIZE,
            format_version: 0,
            sector_size_shift,
            hash_table_pos: HEADER_SIZE as i32,
            block_table_pos: HEADER_SIZE as i32,
            hash_table_size: 0,
            block_table_size: 0,
        }
    }

    /// Read an MPQ header, signature included
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != MPQ_HEADER_SIGNATURE {
            return Err(Error::invalid_format(format!(
                "Invalid MPQ signature: 0x{signature:08X}"
            )));
        }

        let header_size = reader.read_u32::<LittleEndian>()?;
        let archive_size = reader.read_u32::<LittleEndian>()?;
        let format_version = reader.read_u16::<LittleEndian>()?;
        let sector_size_shift = reader.read_u16::<LittleEndian>()?;
        let hash_table_pos = reader.read_i32::<LittleEndian>()?;
        let block_table_pos = reader.read_i32::<LittleEndian>()?;
        let hash_table_size = reader.read_u32::<LittleEndian>()?;
        let block_table_size = reader.read_u32::<LittleEndian>()?;

        if sector_size_shift > MAX_SECTOR_SIZE_SHIFT {
            return Err(Error::invalid_format(format!(
                "Sector size shift {sector_size_shift} is out of range"
            )));
        }

        if hash_table_size > MAX_TABLE_ENTRIES || block_table_size > MAX_TABLE_ENTRIES {
            log::debug!(
                "Clamping declared table sizes {hash_table_size}/{block_table_size} to {MAX_TABLE_ENTRIES}"
            );
        }

        Ok(Self {
            header_size,
            archive_size,
            format_version,
            sector_size_shift,
            hash_table_pos,
            block_table_pos,
            hash_table_size: hash_table_size.min(MAX_TABLE_ENTRIES),
            block_table_size: block_table_size.min(MAX_TABLE_ENTRIES),
        })
    }

    /// Parse a header from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE as usize {
            return Err(Error::invalid_format("MPQ header truncated"));
        }
        Self::read(&mut &data[..HEADER_SIZE as usize])
    }

    /// Write the fixed 32-byte layout
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(MPQ_HEADER_SIGNATURE)?;
        writer.write_u32::<LittleEndian>(self.header_size)?;
        writer.write_u32::<LittleEndian>(self.archive_size)?;
        writer.write_u16::<LittleEndian>(self.format_version)?;
        writer.write_u16::<LittleEndian>(self.sector_size_shift)?;
        writer.write_i32::<LittleEndian>(self.hash_table_pos)?;
        writer.write_i32::<LittleEndian>(self.block_table_pos)?;
        writer.write_u32::<LittleEndian>(self.hash_table_size)?;
        writer.write_u32::<LittleEndian>(self.block_table_size)?;
        Ok(())
    }

    /// Serialize to the fixed 32-byte layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE as usize);
        bytes.extend_from_slice(&MPQ_HEADER_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&self.header_size.to_le_bytes());
        bytes.extend_from_slice(&self.archive_size.to_le_bytes());
        bytes.extend_from_slice(&self.format_version.to_le_bytes());
        bytes.extend_from_slice(&self.sector_size_shift.to_le_bytes());
        bytes.extend_from_slice(&self.hash_table_pos.to_le_bytes());
        bytes.extend_from_slice(&self.block_table_pos.to_le_bytes());
        bytes.extend_from_slice(&self.hash_table_size.to_le_bytes());
        bytes.extend_from_slice(&self.block_table_size.to_le_bytes());
        bytes
    }

    /// Get the sector size in bytes
    pub fn sector_size(&self) -> usize {
        crate::calculate_sector_size(self.sector_size_shift)
    }
}

/// Warcraft III map header (`HM3W`) carried in front of the MPQ body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapHeader {
    /// Reserved dword following the signature
    pub reserved: u32,
    /// Raw map name, without the terminating NUL
    pub name: Vec<u8>,
    /// Map flags
    pub flags: i32,
    /// Maximum number of players
    pub max_players: i32,
}

impl MapHeader {
    /// Parse a map header from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = data;
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != MAP_HEADER_SIGNATURE {
            return Err(Error::invalid_format("Missing HM3W signature"));
        }
        let reserved = reader.read_u32::<LittleEndian>()?;

        let name_len = reader
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::invalid_format("Unterminated map name"))?;
        let name = reader[..name_len].to_vec();
        reader = &reader[name_len + 1..];

        Ok(Self {
            reserved,
            name,
            flags: reader.read_i32::<LittleEndian>()?,
            max_players: reader.read_i32::<LittleEndian>()?,
        })
    }

    /// Map name, lossily decoded
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Serialize, zero-padded to the next 512-byte boundary
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_ALIGNMENT as usize);
        bytes.extend_from_slice(&MAP_HEADER_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&self.reserved.to_le_bytes());
        bytes.extend_from_slice(&self.name);
        bytes.push(0);
        bytes.extend_from_slice(&self.flags.to_le_bytes());
        bytes.extend_from_slice(&self.max_players.to_le_bytes());

        let padded = (bytes.len() as u64).next_multiple_of(HEADER_ALIGNMENT);
        bytes.resize(padded as usize, 0);
        bytes
    }
}

/// Location of an MPQ header inside a buffer or stream
#[derive(Debug, Clone)]
pub struct HeaderLocation {
    /// Absolute offset of the MPQ header
    pub offset: u64,
    /// The parsed header
    pub header: MpqHeader,
    /// Map header found at the start of the data, if any
    pub map_header: Option<MapHeader>,
}

/// Scan 512-byte boundaries for the MPQ signature
pub fn find_header<R: Read + Seek>(reader: &mut R) -> Result<HeaderLocation> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let mut offset = 0u64;
    let mut map_header = None;

    while offset + 4 <= file_size {
        reader.seek(SeekFrom::Start(offset))?;
        let signature = reader.read_u32::<LittleEndian>()?;

        match signature {
            MPQ_HEADER_SIGNATURE => {
                reader.seek(SeekFrom::Start(offset))?;
                let header = MpqHeader::read(reader)?;
                log::debug!(
                    "Found MPQ header at 0x{offset:X}: {} hash / {} block entries, sector size {}",
                    header.hash_table_size,
                    header.block_table_size,
                    header.sector_size()
                );
                return Ok(HeaderLocation {
                    offset,
                    header,
                    map_header,
                });
            }
            MPQ_USERDATA_SIGNATURE => {
                let _user_data_size = reader.read_u32::<LittleEndian>()?;
                let header_offset = reader.read_u32::<LittleEndian>()?;
                let target = offset + u64::from(header_offset);

                if header_offset != 0 && target + 4 <= file_size {
                    reader.seek(SeekFrom::Start(target))?;
                    if reader.read_u32::<LittleEndian>()? == MPQ_HEADER_SIGNATURE {
                        reader.seek(SeekFrom::Start(target))?;
                        let header = MpqHeader::read(reader)?;
                        log::debug!("Followed user data header to MPQ header at 0x{target:X}");
                        return Ok(HeaderLocation {
                            offset: target,
                            header,
                            map_header,
                        });
                    }
                }
            }
            MAP_HEADER_SIGNATURE if offset == 0 => {
                let len = file_size.min(HEADER_ALIGNMENT) as usize;
                let mut block = vec![0u8; len];
                reader.seek(SeekFrom::Start(0))?;
                reader.read_exact(&mut block)?;
                match MapHeader::from_bytes(&block) {
                    Ok(parsed) => map_header = Some(parsed),
                    Err(e) => log::warn!("Ignoring malformed map header: {e}"),
                }
            }
            _ => {}
        }

        offset += HEADER_ALIGNMENT;
    }

    Err(Error::invalid_format("No MPQ header found"))
}

/// Find the offset of the MPQ header inside an in-memory archive
pub fn locate(buffer: &[u8]) -> Result<u64> {
    find_header(&mut std::io::Cursor::new(buffer)).map(|location| location.offset)
}
