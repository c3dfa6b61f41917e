//! Sector layout of file payloads
//!
//! A sectored payload starts with a table of little-endian offsets, one per
//! sector plus the end offset (and one more when sector checksums follow).
//! Encrypted payloads use `key - 1` for the table and `key + k` for sector
//! `k`. A sector whose stored length equals its plain length is raw.
//! Any other sector starts with a method tag, or is bare PKWare data for
//! imploded files. Tagged sectors may be longer than their plain length
//! when the method failed to shrink them.

use super::algorithms::pkware;
use super::{CompressionMethod, compress, decompress};
use crate::crypto::{decrypt_bytes, decrypt_dword, encrypt_bytes};
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// How sector payloads are compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorMode {
    /// Sectors start with a method tag
    Tagged,
    /// Sectors are bare PKWare implode streams
    Imploded,
    /// Sectors are stored back to back with no offset table
    Uncompressed,
}

/// Number of sectors needed for `file_size` bytes
pub fn sector_count(file_size: usize, sector_size: usize) -> usize {
    file_size.div_ceil(sector_size)
}

/// Plain length of sector `index`
fn plain_sector_len(index: usize, file_size: usize, sector_size: usize) -> usize {
    (file_size - index * sector_size).min(sector_size)
}

fn sector_key(key: u32, index: usize) -> u32 {
    key.wrapping_add(index as u32)
}

fn table_key(key: u32) -> u32 {
    key.wrapping_sub(1)
}

/// Decrypt and parse a raw offset table
pub fn parse_offset_table(table: &[u8], key: Option<u32>) -> Vec<u32> {
    let mut table = table[..table.len() / 4 * 4].to_vec();
    if let Some(key) = key {
        decrypt_bytes(&mut table, table_key(key));
    }
    let mut offsets = vec![0u32; table.len() / 4];
    LittleEndian::read_u32_into(&table, &mut offsets);
    offsets
}

/// Decode the first offset-table entry, which is the table's own length
pub fn first_offset(raw: [u8; 4], key: Option<u32>) -> u32 {
    let value = u32::from_le_bytes(raw);
    key.map_or(value, |key| decrypt_dword(value, table_key(key)))
}

/// Split and compress `data` into a sectored payload
pub fn encode_sectors(
    data: &[u8],
    sector_size: usize,
    method: CompressionMethod,
    key: Option<u32>,
) -> Result<Vec<u8>> {
    let count = sector_count(data.len(), sector_size);
    let table_len = (count + 1) * 4;

    let mut offsets = Vec::with_capacity(count + 1);
    let mut body = Vec::with_capacity(data.len() / 2);
    offsets.push(table_len as u32);

    for (index, chunk) in data.chunks(sector_size).enumerate() {
        let mut sector = compress(chunk, method)?;
        if let Some(key) = key {
            encrypt_bytes(&mut sector, sector_key(key, index));
        }
        body.extend_from_slice(&sector);
        offsets.push(
            u32::try_from(table_len + body.len())
                .map_err(|_| Error::CapacityExceeded("File payload exceeds 4 GiB".into()))?,
        );
    }

    let mut output = vec![0u8; table_len];
    LittleEndian::write_u32_into(&offsets, &mut output);
    if let Some(key) = key {
        encrypt_bytes(&mut output, table_key(key));
    }
    output.extend_from_slice(&body);

    log::trace!(
        "Encoded {} bytes into {count} sectors, {} bytes on disk",
        data.len(),
        output.len()
    );
    Ok(output)
}

/// Store `data` as raw sectors with no offset table
pub fn encode_uncompressed(data: &[u8], sector_size: usize, key: Option<u32>) -> Vec<u8> {
    let mut output = data.to_vec();
    if let Some(key) = key {
        for (index, chunk) in output.chunks_mut(sector_size).enumerate() {
            encrypt_bytes(chunk, sector_key(key, index));
        }
    }
    output
}

/// Encode `data` as one unit
pub fn encode_single_unit(
    data: &[u8],
    method: Option<CompressionMethod>,
    key: Option<u32>,
) -> Result<Vec<u8>> {
    let mut output = match method {
        Some(method) if !data.is_empty() => compress(data, method)?,
        _ => data.to_vec(),
    };
    if let Some(key) = key {
        encrypt_bytes(&mut output, key);
    }
    Ok(output)
}

/// Decode a sectored payload into `file_size` plain bytes
pub fn decode_sectors(
    raw: &[u8],
    file_size: usize,
    sector_size: usize,
    mode: SectorMode,
    has_crc: bool,
    key: Option<u32>,
) -> Result<Vec<u8>> {
    if mode == SectorMode::Uncompressed {
        return decode_uncompressed(raw, file_size, sector_size, key);
    }

    let count = sector_count(file_size, sector_size);
    if count == 0 {
        return Ok(Vec::new());
    }

    let entries = count + 1 + usize::from(has_crc);
    let table_len = entries * 4;
    let table = raw.get(..table_len).ok_or_else(|| {
        Error::invalid_format(format!(
            "Payload of {} bytes cannot hold a {table_len} byte sector table",
            raw.len()
        ))
    })?;
    let offsets = parse_offset_table(table, key);

    let mut output = Vec::with_capacity(file_size);
    for index in 0..count {
        let start = offsets[index] as usize;
        let end = offsets[index + 1] as usize;
        if start > end || end > raw.len() {
            return Err(Error::invalid_format(format!(
                "Sector {index} spans {start}..{end} outside a {} byte payload",
                raw.len()
            )));
        }

        let mut sector = raw[start..end].to_vec();
        if let Some(key) = key {
            decrypt_bytes(&mut sector, sector_key(key, index));
        }

        let expected = plain_sector_len(index, file_size, sector_size);
        output.extend_from_slice(&decode_sector(sector, expected, mode)?);
    }

    Ok(output)
}

fn decode_uncompressed(
    raw: &[u8],
    file_size: usize,
    sector_size: usize,
    key: Option<u32>,
) -> Result<Vec<u8>> {
    let mut output = raw
        .get(..file_size)
        .ok_or_else(|| {
            Error::invalid_format(format!(
                "Payload of {} bytes is shorter than the {file_size} byte file",
                raw.len()
            ))
        })?
        .to_vec();
    if let Some(key) = key {
        for (index, chunk) in output.chunks_mut(sector_size).enumerate() {
            decrypt_bytes(chunk, sector_key(key, index));
        }
    }
    Ok(output)
}

/// Decode a single-unit payload
pub fn decode_single_unit(
    raw: &[u8],
    file_size: usize,
    mode: SectorMode,
    key: Option<u32>,
) -> Result<Vec<u8>> {
    let mut data = raw.to_vec();
    if let Some(key) = key {
        decrypt_bytes(&mut data, key);
    }
    decode_sector(data, file_size, mode)
}

/// Re-encrypt a payload from `old_key` to `new_key` without touching its
/// compressed contents. A trailing checksum block is left as it is.
pub fn recrypt(
    raw: &mut [u8],
    file_size: usize,
    sector_size: usize,
    mode: SectorMode,
    single_unit: bool,
    has_crc: bool,
    old_key: u32,
    new_key: u32,
) -> Result<()> {
    if single_unit {
        decrypt_bytes(raw, old_key);
        encrypt_bytes(raw, new_key);
        return Ok(());
    }

    if mode == SectorMode::Uncompressed {
        let len = file_size.min(raw.len());
        for (index, chunk) in raw[..len].chunks_mut(sector_size).enumerate() {
            decrypt_bytes(chunk, sector_key(old_key, index));
            encrypt_bytes(chunk, sector_key(new_key, index));
        }
        return Ok(());
    }

    let count = sector_count(file_size, sector_size);
    if count == 0 {
        return Ok(());
    }
    let table_len = (count + 1 + usize::from(has_crc)) * 4;
    if raw.len() < table_len {
        return Err(Error::invalid_format("Payload too short for its sector table"));
    }

    let offsets = parse_offset_table(&raw[..table_len], Some(old_key));
    let mut table = vec![0u8; table_len];
    LittleEndian::write_u32_into(&offsets, &mut table);
    encrypt_bytes(&mut table, table_key(new_key));
    raw[..table_len].copy_from_slice(&table);

    for index in 0..count {
        let start = offsets[index] as usize;
        let end = offsets[index + 1] as usize;
        if start > end || end > raw.len() {
            return Err(Error::invalid_format(format!("Sector {index} is out of bounds")));
        }
        let sector = &mut raw[start..end];
        decrypt_bytes(sector, sector_key(old_key, index));
        encrypt_bytes(sector, sector_key(new_key, index));
    }
    Ok(())
}

fn decode_sector(mut sector: Vec<u8>, expected: usize, mode: SectorMode) -> Result<Vec<u8>> {
    if mode == SectorMode::Uncompressed {
        if sector.len() < expected {
            return Err(Error::invalid_format(format!(
                "Stored data is {} bytes, expected {expected}",
                sector.len()
            )));
        }
        sector.truncate(expected);
        return Ok(sector);
    }
    if sector.len() == expected {
        return Ok(sector);
    }

    let decoded = match mode {
        SectorMode::Imploded if sector.len() > expected => {
            sector.truncate(expected);
            return Ok(sector);
        }
        SectorMode::Imploded => pkware::decompress(&sector, expected)?,
        _ => {
            let Some((&tag, payload)) = sector.split_first() else {
                return Err(Error::compression("Empty compressed sector"));
            };
            if CompressionMethod::from_flags(tag).is_some() {
                decompress(payload, tag, expected)?
            } else if sector.len() > expected {
                // Raw data followed by padding
                sector.truncate(expected);
                return Ok(sector);
            } else {
                // Unknown tags pass their payload through unchecked
                return decompress(payload, tag, expected);
            }
        }
    };

    if decoded.len() != expected {
        return Err(Error::compression(format!(
            "Sector decoded to {} bytes, expected {expected}",
            decoded.len()
        )));
    }
    Ok(decoded)
}
