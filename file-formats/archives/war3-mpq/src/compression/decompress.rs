//! Sector decompression and method-chain handling

use super::algorithms::{self, adpcm};
use super::methods::CompressionMethod;
use crate::Result;

/// Decompress the payload of a tagged sector.
///
/// `data` is the sector without its tag byte. Chains run outermost first:
/// Huffman or PKWare, then ADPCM. An unrecognised tag leaves the payload
/// untouched.
pub fn decompress(data: &[u8], tag: u8, expected_size: usize) -> Result<Vec<u8>> {
    let Some(method) = CompressionMethod::from_flags(tag) else {
        log::warn!("Unknown compression tag 0x{tag:02X}, passing {} bytes through", data.len());
        return Ok(data.to_vec());
    };

    log::trace!(
        "Decompressing {} bytes to {expected_size} bytes with {method:?}",
        data.len()
    );

    match method {
        CompressionMethod::Huffman => algorithms::huffman::decompress(data, expected_size),
        CompressionMethod::Zlib => algorithms::zlib::decompress(data, expected_size),
        CompressionMethod::PKWare => algorithms::pkware::decompress(data, expected_size),
        CompressionMethod::AdpcmMono => adpcm::decompress_mono(data, expected_size),
        CompressionMethod::AdpcmStereo => adpcm::decompress_stereo(data, expected_size),
        CompressionMethod::HuffmanAdpcm { stereo } => {
            let inner = algorithms::huffman::decompress(data, intermediate_size(expected_size))?;
            decompress_adpcm(&inner, stereo, expected_size)
        }
        CompressionMethod::PKWareAdpcm { stereo } => {
            let inner = algorithms::pkware::decompress(data, intermediate_size(expected_size))?;
            decompress_adpcm(&inner, stereo, expected_size)
        }
    }
}

/// Upper bound for the ADPCM stream hidden under an outer method
fn intermediate_size(expected_size: usize) -> usize {
    expected_size.saturating_mul(2).saturating_add(16)
}

fn decompress_adpcm(data: &[u8], stereo: bool, expected_size: usize) -> Result<Vec<u8>> {
    if stereo {
        adpcm::decompress_stereo(data, expected_size)
    } else {
        adpcm::decompress_mono(data, expected_size)
    }
}
