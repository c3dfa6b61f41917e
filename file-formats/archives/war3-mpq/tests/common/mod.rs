//! Common test utilities and fixtures

#![allow(dead_code)]

use war3_mpq::{Archive, BlockTable, HashTable, MpqHeader};

/// Route library logging to the test harness
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generate test data of a specific size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Generate repetitive test data (good for compression tests)
pub fn generate_repetitive_data(pattern: &[u8], total_size: usize) -> Vec<u8> {
    pattern.iter().copied().cycle().take(total_size).collect()
}

/// A small map-like set of files
pub fn sample_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (
            "war3map.j",
            generate_repetitive_data(b"call CreateUnit(Player(0), 'hfoo', 0, 0, 270)\n", 9000),
        ),
        ("war3map.w3e", generate_test_data(5000)),
        ("war3map.w3i", b"Map info".to_vec()),
        ("Units\\UnitData.slk", generate_repetitive_data(b"ID;P;X1;Y2\n", 300)),
        ("empty.txt", Vec::new()),
    ]
}

/// Build an archive holding `files` with default insert options
pub fn build_archive(files: &[(&str, Vec<u8>)]) -> Archive<'static> {
    let mut archive = Archive::new();
    for (name, data) in files {
        archive.insert(name, data).expect("Failed to insert file");
    }
    archive
}

/// Serialized archive bytes split into their parsed parts
pub struct RawArchive {
    pub bytes: Vec<u8>,
    pub offset: usize,
    pub header: MpqHeader,
    pub hash_table: HashTable,
    pub block_table: BlockTable,
}

impl RawArchive {
    /// Parse the tables of a serialized archive
    pub fn parse(bytes: Vec<u8>) -> Self {
        let offset = war3_mpq::header::locate(&bytes).expect("No header") as usize;
        let header = MpqHeader::from_bytes(&bytes[offset..]).expect("Bad header");

        let hash_start = offset + header.hash_table_pos as usize;
        let hash_len = header.hash_table_size as usize * 16;
        let block_start = offset + header.block_table_pos as usize;
        let block_len = header.block_table_size as usize * 16;

        let hash_table = HashTable::from_bytes(&bytes[hash_start..hash_start + hash_len])
            .expect("Bad hash table");
        let block_table = BlockTable::from_bytes(&bytes[block_start..block_start + block_len])
            .expect("Bad block table");

        Self {
            bytes,
            offset,
            header,
            hash_table,
            block_table,
        }
    }

    /// Absolute offset of a block's payload
    pub fn payload_start(&self, block_index: usize) -> usize {
        self.offset + self.block_table.entries()[block_index].file_pos as usize
    }

    /// Write both tables back in place, encrypted
    pub fn write_tables(&mut self) {
        let hash_start = self.offset + self.header.hash_table_pos as usize;
        let hash = self.hash_table.to_bytes();
        self.bytes[hash_start..hash_start + hash.len()].copy_from_slice(&hash);

        let block_start = self.offset + self.header.block_table_pos as usize;
        let block = self.block_table.to_bytes();
        self.bytes[block_start..block_start + block.len()].copy_from_slice(&block);
    }

    /// Write the header back in place
    pub fn write_header(&mut self) {
        let header = self.header.to_bytes();
        self.bytes[self.offset..self.offset + header.len()].copy_from_slice(&header);
    }

    /// Block index a name resolves to
    pub fn block_of(&self, name: &str) -> usize {
        let slot = self
            .hash_table
            .find(war3_mpq::NameHash::new(name))
            .expect("Name not in hash table");
        self.hash_table.entries()[slot]
            .live_block_index()
            .expect("Slot is not live")
    }

    /// Hash slot a name resolves to
    pub fn slot_of(&self, name: &str) -> usize {
        self.hash_table
            .find(war3_mpq::NameHash::new(name))
            .expect("Name not in hash table")
    }
}
