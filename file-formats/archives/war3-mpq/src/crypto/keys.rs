//! The shared crypt table

/// Number of words in the crypt table
pub const ENCRYPTION_TABLE_SIZE: usize = 0x500;

/// Offset of the row that feeds the stream cipher
pub(crate) const CIPHER_ROW: usize = 0x400;

/// Seed of the linear congruential generator used to fill the table
const TABLE_SEED: u32 = 0x0010_0001;

const fn generate_encryption_table() -> [u32; ENCRYPTION_TABLE_SIZE] {
    let mut table = [0u32; ENCRYPTION_TABLE_SIZE];
    let mut seed = TABLE_SEED;

    let mut index_a = 0;
    while index_a < 0x100 {
        let mut index_b = index_a;
        let mut row = 0;
        while row < 5 {
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let high = (seed & 0xFFFF) << 16;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let low = seed & 0xFFFF;

            table[index_b] = high | low;

            row += 1;
            index_b += 0x100;
        }
        index_a += 1;
    }

    table
}

/// Crypt table used by both the name hash and the stream cipher.
///
/// Rows `0x000..0x400` serve the four hash purposes, row `0x400..0x500`
/// feeds the cipher. Built at compile time.
pub static ENCRYPTION_TABLE: [u32; ENCRYPTION_TABLE_SIZE] = generate_encryption_table();
