//! Compression and decompression for MPQ sectors
//!
//! Every compressed sector begins with a tag byte naming the method chain:
//!
//! | Tag    | Chain                      |
//! |--------|----------------------------|
//! | `0x01` | Huffman                    |
//! | `0x02` | Deflate (zlib)             |
//! | `0x08` | PKWare implode             |
//! | `0x40` | IMA ADPCM mono             |
//! | `0x80` | IMA ADPCM stereo           |
//! | `0x41`/`0x81` | Huffman over ADPCM  |
//! | `0x48`/`0x88` | PKWare over ADPCM   |

mod algorithms;
mod compress;
mod decompress;
mod methods;
pub mod sector;

pub use compress::compress;
pub use decompress::decompress;
pub use methods::{CompressionMethod, flags};
pub use sector::{SectorMode, sector_count};
