//! Compression method and sector layout tests

use crate::common::{generate_repetitive_data, generate_test_data};
use pretty_assertions::assert_eq;
use war3_mpq::compression::sector::{decode_sectors, encode_sectors, parse_offset_table};
use war3_mpq::compression::{CompressionMethod, SectorMode, compress, decompress, flags};

const SECTOR: usize = 4096;

fn round_trip(data: &[u8], method: CompressionMethod) -> Vec<u8> {
    let compressed = compress(data, method).expect("Compression failed");
    if compressed.len() == data.len() {
        // Stored sector
        return compressed;
    }
    decompress(&compressed[1..], compressed[0], data.len()).expect("Decompression failed")
}

#[test]
fn test_lossless_methods_round_trip() {
    let text = generate_repetitive_data(b"Footman, Knight, Rifleman, Priest. ", SECTOR);
    let binary = generate_test_data(SECTOR);

    for method in [
        CompressionMethod::Zlib,
        CompressionMethod::PKWare,
        CompressionMethod::Huffman,
    ] {
        assert_eq!(round_trip(&text, method), text, "{method:?} on text");
        assert_eq!(round_trip(&binary, method), binary, "{method:?} on binary");
    }
}

#[test]
fn test_method_tags() {
    let text = generate_repetitive_data(b"abcabcabd", 2048);
    assert_eq!(compress(&text, CompressionMethod::Zlib).unwrap()[0], flags::ZLIB);
    assert_eq!(compress(&text, CompressionMethod::PKWare).unwrap()[0], flags::PKWARE);
    assert_eq!(compress(&text, CompressionMethod::Huffman).unwrap()[0], flags::HUFFMAN);
}

#[test]
fn test_adpcm_chains_on_silence() {
    let silence = vec![0u8; SECTOR];

    for (method, tag) in [
        (CompressionMethod::AdpcmMono, 0x40),
        (CompressionMethod::AdpcmStereo, 0x80),
        (CompressionMethod::HuffmanAdpcm { stereo: false }, 0x41),
        (CompressionMethod::HuffmanAdpcm { stereo: true }, 0x81),
        (CompressionMethod::PKWareAdpcm { stereo: false }, 0x48),
        (CompressionMethod::PKWareAdpcm { stereo: true }, 0x88),
    ] {
        let compressed = compress(&silence, method).unwrap();
        assert_eq!(compressed[0], tag, "{method:?}");
        assert_eq!(CompressionMethod::from_flags(tag), Some(method));

        let decoded = decompress(&compressed[1..], compressed[0], SECTOR).unwrap();
        assert_eq!(decoded, silence, "{method:?}");
    }
}

#[test]
fn test_incompressible_sector_is_stored() {
    let data = generate_test_data(64);
    let stored = compress(&data, CompressionMethod::Zlib).unwrap();
    assert_eq!(stored, data);
}

#[test]
fn test_sector_table_layout() {
    let data = generate_repetitive_data(b"0123456789", SECTOR * 2 + 500);
    let encoded = encode_sectors(&data, SECTOR, CompressionMethod::Zlib, None).unwrap();

    let offsets = parse_offset_table(&encoded[..16], None);
    assert_eq!(offsets[0], 16);
    assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(offsets[3] as usize, encoded.len());

    let decoded =
        decode_sectors(&encoded, data.len(), SECTOR, SectorMode::Tagged, false, None).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn test_encrypted_sectors() {
    let data = generate_test_data(SECTOR * 3);
    let key = 0x0BAD_F00D;
    let encoded = encode_sectors(&data, SECTOR, CompressionMethod::Zlib, Some(key)).unwrap();

    let decoded =
        decode_sectors(&encoded, data.len(), SECTOR, SectorMode::Tagged, false, Some(key))
            .unwrap();
    assert_eq!(decoded, data);
}

/// Wrap sector payloads in an offset table
fn sectored(sectors: &[Vec<u8>]) -> Vec<u8> {
    let table_len = (sectors.len() + 1) * 4;
    let mut offsets = vec![table_len as u32];
    let mut body = Vec::new();
    for sector in sectors {
        body.extend_from_slice(sector);
        offsets.push((table_len + body.len()) as u32);
    }

    let mut raw = Vec::new();
    for offset in offsets {
        raw.extend_from_slice(&offset.to_le_bytes());
    }
    raw.extend_from_slice(&body);
    raw
}

#[test]
fn test_unknown_tag_sector_passes_through() {
    let mut sector = vec![0x10];
    sector.extend_from_slice(b"0123456789");
    let raw = sectored(&[sector]);

    let decoded = decode_sectors(&raw, 16, SECTOR, SectorMode::Tagged, false, None).unwrap();
    assert_eq!(decoded, b"0123456789");
}

#[test]
fn test_deflate_sector_that_grew() {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::io::Write;

    let mut rng = StdRng::seed_from_u64(0x5EC7);
    let noise: Vec<u8> = (0..512).map(|_| rng.random()).collect();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&noise).unwrap();

    let mut grown = vec![flags::ZLIB];
    grown.extend_from_slice(&encoder.finish().unwrap());
    assert!(grown.len() > noise.len());

    // A second, ordinary sector behind the grown one
    let tail = generate_repetitive_data(b"tail ", 200);
    let tail_sector = compress(&tail, CompressionMethod::Zlib).unwrap();
    let raw = sectored(&[grown, tail_sector]);

    let decoded = decode_sectors(&raw, 712, 512, SectorMode::Tagged, false, None).unwrap();
    assert_eq!(&decoded[..512], &noise[..]);
    assert_eq!(&decoded[512..], &tail[..]);
}
