//! PKWare DCL implode using pklib

use crate::{Error, Result};
use pklib::{CompressionMode, DictionarySize, explode_bytes, implode_bytes};

/// Implode data with the settings map editors use
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    implode_bytes(data, CompressionMode::Binary, DictionarySize::Size4K)
        .map_err(|e| Error::compression(format!("PKWare compression failed: {e}")))
}

/// Explode PKWare DCL data
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let exploded = explode_bytes(data)
        .map_err(|e| Error::compression(format!("PKWare decompression failed: {e}")))?;

    if exploded.len() != expected_size {
        log::debug!(
            "PKWare produced {} bytes, expected {expected_size}",
            exploded.len()
        );
    }
    Ok(exploded)
}
