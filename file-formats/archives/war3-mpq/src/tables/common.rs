//! Common utilities shared by the MPQ tables

use crate::crypto::{decrypt_bytes, encrypt_bytes};
use rand::Rng;

/// Size of a hash or block table record on disk
pub(crate) const ENTRY_SIZE: usize = 16;

/// Decrypt raw table bytes, keeping only whole records
pub(crate) fn decrypt_table_data(data: &[u8], key: u32) -> Vec<u8> {
    let whole = data.len() / ENTRY_SIZE * ENTRY_SIZE;
    if whole != data.len() {
        log::warn!(
            "Table data is {} bytes, ignoring {} trailing bytes",
            data.len(),
            data.len() - whole
        );
    }
    let mut raw = data[..whole].to_vec();
    decrypt_bytes(&mut raw, key);
    raw
}

/// Encrypt serialized table bytes in place
pub(crate) fn encrypt_table_data(data: &mut [u8], key: u32) {
    encrypt_bytes(data, key);
}

/// Result of a randomized permutation: `new_position[old] == new`
#[derive(Debug, Clone)]
pub(crate) struct Shuffled {
    pub(crate) new_position: Vec<usize>,
}

impl Shuffled {
    /// New index of the element that used to live at `old`
    pub(crate) fn map(&self, old: usize) -> usize {
        self.new_position.get(old).copied().unwrap_or(old)
    }
}

/// Apply `iterations` random transpositions to `items`
pub(crate) fn shuffle_in_place<T, R: Rng + ?Sized>(
    items: &mut [T],
    rng: &mut R,
    iterations: usize,
) -> Shuffled {
    let len = items.len();
    // origin[slot] is the index the element in `slot` started at
    let mut origin: Vec<usize> = (0..len).collect();

    if len > 1 {
        for _ in 0..iterations {
            let a = rng.random_range(0..len);
            let b = rng.random_range(0..len);
            items.swap(a, b);
            origin.swap(a, b);
        }
    }

    let mut new_position = vec![0; len];
    for (slot, &old) in origin.iter().enumerate() {
        new_position[old] = slot;
    }
    Shuffled { new_position }
}
