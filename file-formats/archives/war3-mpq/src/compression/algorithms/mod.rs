//! Compression algorithm implementations

pub(super) mod adpcm;
pub(super) mod huffman;
pub(super) mod pkware;
pub(super) mod zlib;
