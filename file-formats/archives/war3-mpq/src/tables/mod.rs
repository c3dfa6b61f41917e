//! MPQ table structures (hash, block)

mod block;
mod common;
mod hash;

pub use block::{BlockEntry, BlockTable, MAX_FILE_SIZE};
pub use hash::{HashEntry, HashTable, MAX_BLOCK_INDEX, is_safe_index, mask_block_index};

pub(crate) use common::{ENTRY_SIZE, shuffle_in_place};
