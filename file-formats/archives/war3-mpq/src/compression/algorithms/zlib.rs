//! Zlib compression and decompression

use crate::{Error, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Decompress a zlib stream
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(expected_size);

    decoder.read_to_end(&mut decompressed).map_err(|e| {
        log::trace!(
            "Zlib input starts with {:02X?}",
            &data[..16.min(data.len())]
        );
        Error::compression(format!("Zlib decompression failed: {e}"))
    })?;

    if decompressed.len() != expected_size {
        log::debug!(
            "Zlib produced {} bytes, expected {expected_size}",
            decompressed.len()
        );
    }
    Ok(decompressed)
}

/// Compress into a zlib stream
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::compression(format!("Zlib compression failed: {e}")))?;

    encoder
        .finish()
        .map_err(|e| Error::compression(format!("Zlib compression failed: {e}")))
}
