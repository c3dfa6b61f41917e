//! Compression method tags

/// Per-sector method tag bits
pub mod flags {
    /// Adaptive Huffman coding
    pub const HUFFMAN: u8 = 0x01;
    /// Deflate with a zlib wrapper
    pub const ZLIB: u8 = 0x02;
    /// PKWare DCL implode
    pub const PKWARE: u8 = 0x08;
    /// IMA ADPCM mono
    pub const ADPCM_MONO: u8 = 0x40;
    /// IMA ADPCM stereo
    pub const ADPCM_STEREO: u8 = 0x80;
}

/// The method chains a sector may be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Adaptive Huffman coding
    Huffman,
    /// Deflate/zlib compression
    Zlib,
    /// PKWare DCL implode
    PKWare,
    /// IMA ADPCM mono
    AdpcmMono,
    /// IMA ADPCM stereo
    AdpcmStereo,
    /// Huffman applied over ADPCM
    HuffmanAdpcm {
        /// Two interleaved channels
        stereo: bool,
    },
    /// PKWare implode applied over ADPCM
    PKWareAdpcm {
        /// Two interleaved channels
        stereo: bool,
    },
}

impl CompressionMethod {
    /// Map a sector tag to a method chain. Unknown tags yield `None`.
    pub fn from_flags(tag: u8) -> Option<Self> {
        let method = match tag {
            flags::HUFFMAN => Self::Huffman,
            flags::ZLIB => Self::Zlib,
            flags::PKWARE => Self::PKWare,
            flags::ADPCM_MONO => Self::AdpcmMono,
            flags::ADPCM_STEREO => Self::AdpcmStereo,
            0x41 => Self::HuffmanAdpcm { stereo: false },
            0x81 => Self::HuffmanAdpcm { stereo: true },
            0x48 => Self::PKWareAdpcm { stereo: false },
            0x88 => Self::PKWareAdpcm { stereo: true },
            _ => return None,
        };
        Some(method)
    }

    /// The tag byte written in front of a sector
    pub fn tag(self) -> u8 {
        match self {
            Self::Huffman => flags::HUFFMAN,
            Self::Zlib => flags::ZLIB,
            Self::PKWare => flags::PKWARE,
            Self::AdpcmMono => flags::ADPCM_MONO,
            Self::AdpcmStereo => flags::ADPCM_STEREO,
            Self::HuffmanAdpcm { stereo } => flags::HUFFMAN | adpcm_bit(stereo),
            Self::PKWareAdpcm { stereo } => flags::PKWARE | adpcm_bit(stereo),
        }
    }

    /// Whether the chain includes an ADPCM stage
    pub fn uses_adpcm(self) -> bool {
        !matches!(self, Self::Huffman | Self::Zlib | Self::PKWare)
    }
}

fn adpcm_bit(stereo: bool) -> u8 {
    if stereo {
        flags::ADPCM_STEREO
    } else {
        flags::ADPCM_MONO
    }
}
