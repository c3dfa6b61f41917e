//! Sector compression

use super::algorithms::{self, adpcm};
use super::methods::CompressionMethod;
use crate::Result;

/// Compress one sector.
///
/// Returns the method tag followed by the compressed bytes, or the input
/// unchanged when that would not be smaller. Callers tell the two apart by
/// length: a stored sector is exactly as long as its plain data.
pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    let compressed = compress_payload(data, method)?;

    if 1 + compressed.len() >= data.len() {
        log::trace!("Storing {} byte sector, {method:?} did not shrink it", data.len());
        Ok(data.to_vec())
    } else {
        let mut result = Vec::with_capacity(1 + compressed.len());
        result.push(method.tag());
        result.extend_from_slice(&compressed);
        Ok(result)
    }
}

/// Apply a method chain without the tag byte. ADPCM runs first.
fn compress_payload(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Huffman => algorithms::huffman::compress(data),
        CompressionMethod::Zlib => algorithms::zlib::compress(data),
        CompressionMethod::PKWare => algorithms::pkware::compress(data),
        CompressionMethod::AdpcmMono => adpcm::compress_mono(data, adpcm::DEFAULT_LEVEL),
        CompressionMethod::AdpcmStereo => adpcm::compress_stereo(data, adpcm::DEFAULT_LEVEL),
        CompressionMethod::HuffmanAdpcm { stereo } => {
            algorithms::huffman::compress(&compress_adpcm(data, stereo)?)
        }
        CompressionMethod::PKWareAdpcm { stereo } => {
            algorithms::pkware::compress(&compress_adpcm(data, stereo)?)
        }
    }
}

fn compress_adpcm(data: &[u8], stereo: bool) -> Result<Vec<u8>> {
    if stereo {
        adpcm::compress_stereo(data, adpcm::DEFAULT_LEVEL)
    } else {
        adpcm::compress_mono(data, adpcm::DEFAULT_LEVEL)
    }
}
