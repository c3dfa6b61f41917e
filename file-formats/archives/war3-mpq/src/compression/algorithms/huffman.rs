//! Adaptive Huffman coding used on sound sectors
//!
//! The tree is rebuilt from a fixed weight table selected by the first byte
//! of the stream. Items live in an arena and are also threaded on a doubly
//! linked list sorted by descending weight, with slot 0 as the list head.
//! Encoder and decoder apply the same rebalancing after each symbol, so both
//! sides see the same tree at every step. Bits are packed LSB first.

use crate::{Error, Result};

/// Upper bound on live tree items
const HUFF_ITEM_COUNT: usize = 0x203;
const HEAD: usize = 0;

/// Stream terminator symbol
const SYMBOL_END: u16 = 0x100;
/// Escape symbol: a literal byte follows and grows the tree
const SYMBOL_NEW_BYTE: u16 = 0x101;

/// Weight table used by the encoder; the only one that adapts to every byte
const ADAPTIVE_TYPE: u8 = 0;

const BYTE_TO_WEIGHT_00: [u8; 258] = [
    0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
    0x00, 0x00,
];

const BYTE_TO_WEIGHT_01: [u8; 258] = [
    0x54, 0x16, 0x16, 0x0D, 0x0C, 0x08, 0x06, 0x05, 0x06, 0x05, 0x06, 0x03, 0x04, 0x04, 0x03, 0x05,
    0x0E, 0x0B, 0x14, 0x13, 0x13, 0x09, 0x0B, 0x06, 0x05, 0x04, 0x03, 0x02, 0x03, 0x02, 0x02, 0x02,
    0x0D, 0x07, 0x09, 0x06, 0x06, 0x04, 0x03, 0x02, 0x04, 0x03, 0x03, 0x03, 0x03, 0x03, 0x02, 0x02,
    0x09, 0x06, 0x04, 0x04, 0x04, 0x04, 0x03, 0x02, 0x03, 0x02, 0x02, 0x02, 0x02, 0x03, 0x02, 0x04,
    0x08, 0x03, 0x04, 0x07, 0x09, 0x05, 0x03, 0x03, 0x03, 0x03, 0x02, 0x02, 0x02, 0x03, 0x02, 0x02,
    0x03, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x01, 0x01, 0x01, 0x02, 0x01, 0x02, 0x02,
    0x06, 0x0A, 0x08, 0x08, 0x06, 0x07, 0x04, 0x03, 0x04, 0x04, 0x02, 0x02, 0x04, 0x02, 0x03, 0x03,
    0x04, 0x03, 0x07, 0x07, 0x09, 0x06, 0x04, 0x03, 0x03, 0x02, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02,
    0x0A, 0x02, 0x02, 0x03, 0x02, 0x02, 0x01, 0x01, 0x02, 0x02, 0x02, 0x06, 0x03, 0x05, 0x02, 0x03,
    0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x01, 0x01,
    0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x04, 0x04, 0x04, 0x07, 0x09, 0x08, 0x0C, 0x02,
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01, 0x01, 0x03,
    0x04, 0x01, 0x02, 0x04, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01, 0x01, 0x01,
    0x04, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x01, 0x01, 0x02, 0x02, 0x02, 0x06, 0x4B,
    0x00, 0x00,
];

const BYTE_TO_WEIGHT_02: [u8; 258] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x27, 0x00, 0x00, 0x23, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x01, 0x01, 0x06, 0x0E, 0x10, 0x04,
    0x06, 0x08, 0x05, 0x04, 0x04, 0x03, 0x03, 0x02, 0x02, 0x03, 0x03, 0x01, 0x01, 0x02, 0x01, 0x01,
    0x01, 0x04, 0x02, 0x04, 0x02, 0x02, 0x02, 0x01, 0x01, 0x04, 0x01, 0x01, 0x02, 0x03, 0x03, 0x02,
    0x03, 0x01, 0x03, 0x06, 0x04, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01, 0x02, 0x01, 0x01,
    0x01, 0x29, 0x07, 0x16, 0x12, 0x40, 0x0A, 0x0A, 0x11, 0x25, 0x01, 0x03, 0x17, 0x10, 0x26, 0x2A,
    0x10, 0x01, 0x23, 0x23, 0x2F, 0x10, 0x06, 0x07, 0x02, 0x09, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

const WEIGHT_TABLES: [&[u8; 258]; 3] = [&BYTE_TO_WEIGHT_00, &BYTE_TO_WEIGHT_01, &BYTE_TO_WEIGHT_02];

struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn bit(&mut self) -> Result<bool> {
        let byte = self
            .data
            .get(self.position / 8)
            .ok_or_else(|| Error::compression("Unexpected end of Huffman data"))?;
        let bit = (byte >> (self.position % 8)) & 1 != 0;
        self.position += 1;
        Ok(bit)
    }

    fn byte(&mut self) -> Result<u8> {
        let mut value = 0u8;
        for shift in 0..8 {
            if self.bit()? {
                value |= 1 << shift;
            }
        }
        Ok(value)
    }
}

#[derive(Default)]
struct BitWriter {
    output: Vec<u8>,
    bit_count: usize,
}

impl BitWriter {
    fn bit(&mut self, bit: bool) {
        let shift = self.bit_count % 8;
        if shift == 0 {
            self.output.push(0);
        }
        if bit {
            if let Some(last) = self.output.last_mut() {
                *last |= 1 << shift;
            }
        }
        self.bit_count += 1;
    }

    fn byte(&mut self, value: u8) {
        for shift in 0..8 {
            self.bit((value >> shift) & 1 != 0);
        }
    }

    fn finish(self) -> Vec<u8> {
        self.output
    }
}

#[derive(Debug, Clone, Copy)]
struct Item {
    value: u16,
    weight: u32,
    parent: Option<usize>,
    child_lo: Option<usize>,
    next: usize,
    prev: usize,
}

impl Item {
    fn new(value: u16, weight: u32) -> Self {
        Self {
            value,
            weight,
            parent: None,
            child_lo: None,
            next: HEAD,
            prev: HEAD,
        }
    }
}

#[derive(Clone, Copy)]
enum InsertAt {
    Front,
    Back,
}

struct HuffmanTree {
    items: Vec<Item>,
    items_by_byte: [Option<usize>; 0x102],
    adaptive: bool,
}

impl HuffmanTree {
    fn build(compression_type: u8) -> Result<Self> {
        let table = WEIGHT_TABLES
            .get(usize::from(compression_type & 0x0F))
            .ok_or_else(|| {
                Error::compression(format!(
                    "Unsupported Huffman weight table {compression_type}"
                ))
            })?;

        let mut tree = Self {
            items: Vec::with_capacity(HUFF_ITEM_COUNT + 1),
            items_by_byte: [None; 0x102],
            adaptive: compression_type == ADAPTIVE_TYPE,
        };
        tree.items.push(Item::new(0, 0));

        let mut max_weight = 0;
        for (byte, &weight) in table.iter().take(0x100).enumerate() {
            if weight != 0 {
                let item = tree.create(byte as u16, u32::from(weight), InsertAt::Front)?;
                max_weight = tree.fixup_position(item, max_weight);
                tree.items_by_byte[byte] = Some(item);
            }
        }

        for symbol in [SYMBOL_END, SYMBOL_NEW_BYTE] {
            let item = tree.create(symbol, 1, InsertAt::Back)?;
            tree.items_by_byte[usize::from(symbol)] = Some(item);
        }

        // Pair items from the light end of the list upwards
        let mut child_lo = tree.last();
        while child_lo != HEAD {
            let child_hi = tree.items[child_lo].prev;
            if child_hi == HEAD {
                break;
            }

            let weight = tree.items[child_hi].weight + tree.items[child_lo].weight;
            let parent = tree.create(0, weight, InsertAt::Front)?;
            tree.items[child_lo].parent = Some(parent);
            tree.items[child_hi].parent = Some(parent);
            tree.items[parent].child_lo = Some(child_lo);
            max_weight = tree.fixup_position(parent, max_weight);

            child_lo = tree.items[child_hi].prev;
        }

        Ok(tree)
    }

    fn first(&self) -> usize {
        self.items[HEAD].next
    }

    fn last(&self) -> usize {
        self.items[HEAD].prev
    }

    fn unlink(&mut self, index: usize) {
        let Item { prev, next, .. } = self.items[index];
        self.items[prev].next = next;
        self.items[next].prev = prev;
    }

    fn link_after(&mut self, index: usize, anchor: usize) {
        let next = self.items[anchor].next;
        self.items[index].prev = anchor;
        self.items[index].next = next;
        self.items[next].prev = index;
        self.items[anchor].next = index;
    }

    fn create(&mut self, value: u16, weight: u32, at: InsertAt) -> Result<usize> {
        if self.items.len() > HUFF_ITEM_COUNT {
            return Err(Error::compression("Huffman tree is full"));
        }
        let index = self.items.len();
        self.items.push(Item::new(value, weight));
        let anchor = match at {
            InsertAt::Front => HEAD,
            InsertAt::Back => self.last(),
        };
        self.link_after(index, anchor);
        Ok(index)
    }

    /// Walk towards the head from `from`, returning the first item at least
    /// as heavy as `weight`, or the head itself
    fn find_higher_or_equal(&self, from: usize, weight: u32) -> usize {
        let mut index = from;
        while index != HEAD {
            if self.items[index].weight >= weight {
                return index;
            }
            index = self.items[index].prev;
        }
        HEAD
    }

    fn fixup_position(&mut self, index: usize, max_weight: u32) -> u32 {
        let weight = self.items[index].weight;
        if weight < max_weight {
            let higher = self.find_higher_or_equal(self.last(), weight);
            self.unlink(index);
            self.link_after(index, higher);
            max_weight
        } else {
            weight
        }
    }

    /// Split the lightest leaf into itself and a new zero-weight leaf
    fn insert_new_branch(&mut self, value: u8) -> Result<()> {
        let last = self.last();
        let Item {
            value: last_value,
            weight: last_weight,
            ..
        } = self.items[last];

        let child_hi = self.create(last_value, last_weight, InsertAt::Back)?;
        self.items[child_hi].parent = Some(last);
        self.items_by_byte[usize::from(last_value)] = Some(child_hi);

        let child_lo = self.create(u16::from(value), 0, InsertAt::Back)?;
        self.items[child_lo].parent = Some(last);
        self.items[last].child_lo = Some(child_lo);
        self.items_by_byte[usize::from(value)] = Some(child_lo);

        self.increment(child_lo);
        Ok(())
    }

    /// Bump the weight of an item and its ancestors, swapping each with the
    /// first lighter item in the list so the ordering stays intact
    fn increment(&mut self, index: usize) {
        let mut current = Some(index);
        while let Some(item) = current {
            self.items[item].weight += 1;
            let weight = self.items[item].weight;

            let higher = self.find_higher_or_equal(self.items[item].prev, weight);
            let child_hi = self.items[higher].next;

            if child_hi != item {
                self.unlink(child_hi);
                self.link_after(child_hi, item);
                self.unlink(item);
                self.link_after(item, higher);

                let other_lo = self.items[child_hi]
                    .parent
                    .and_then(|parent| self.items[parent].child_lo);
                if let Some(parent) = self.items[item].parent {
                    if self.items[parent].child_lo == Some(item) {
                        self.items[parent].child_lo = Some(child_hi);
                    }
                }
                if other_lo == Some(child_hi) {
                    if let Some(parent) = self.items[child_hi].parent {
                        self.items[parent].child_lo = Some(item);
                    }
                }

                let parent = self.items[item].parent;
                self.items[item].parent = self.items[child_hi].parent;
                self.items[child_hi].parent = parent;
            }

            current = self.items[item].parent;
        }
    }

    fn record(&mut self, byte: u8) {
        if let Some(item) = self.items_by_byte[usize::from(byte)] {
            self.increment(item);
        }
    }

    fn decode_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let mut item = self.first();
        if item == HEAD {
            return Err(Error::compression("Huffman tree is empty"));
        }

        let mut depth = 0;
        while let Some(child_lo) = self.items[item].child_lo {
            item = if reader.bit()? {
                self.items[child_lo].prev
            } else {
                child_lo
            };
            depth += 1;
            if item == HEAD || depth > HUFF_ITEM_COUNT {
                return Err(Error::compression("Corrupt Huffman tree"));
            }
        }

        Ok(self.items[item].value)
    }

    fn encode_symbol(&self, writer: &mut BitWriter, symbol: u16) -> Result<()> {
        let mut item = self.items_by_byte[usize::from(symbol)]
            .ok_or_else(|| Error::compression("Huffman symbol missing from tree"))?;

        let mut path = Vec::new();
        while let Some(parent) = self.items[item].parent {
            path.push(self.items[parent].child_lo != Some(item));
            item = parent;
            if path.len() > HUFF_ITEM_COUNT {
                return Err(Error::compression("Corrupt Huffman tree"));
            }
        }

        // Collected leaf to root, emitted root first
        for &bit in path.iter().rev() {
            writer.bit(bit);
        }
        Ok(())
    }
}

/// Decompress a Huffman stream into at most `expected_size` bytes
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if data.is_empty() || expected_size == 0 {
        return Ok(Vec::new());
    }

    let mut reader = BitReader::new(data);
    let compression_type = reader.byte()?;
    let mut tree = HuffmanTree::build(compression_type)?;
    let mut output = Vec::with_capacity(expected_size);

    loop {
        let symbol = tree.decode_symbol(&mut reader)?;
        if symbol == SYMBOL_END {
            break;
        }

        let byte = if symbol == SYMBOL_NEW_BYTE {
            let byte = reader.byte()?;
            tree.insert_new_branch(byte)?;
            if !tree.adaptive {
                tree.record(byte);
            }
            byte
        } else {
            u8::try_from(symbol)
                .map_err(|_| Error::compression("Invalid Huffman symbol"))?
        };

        output.push(byte);
        if output.len() >= expected_size {
            break;
        }
        if tree.adaptive {
            tree.record(byte);
        }
    }

    log::trace!(
        "Huffman type {compression_type}: {} bytes in, {} bytes out",
        data.len(),
        output.len()
    );
    Ok(output)
}

/// Compress with the adaptive weight table
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with_type(data, ADAPTIVE_TYPE)
}

/// Compress with an explicit weight table
pub(crate) fn compress_with_type(data: &[u8], compression_type: u8) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut tree = HuffmanTree::build(compression_type)?;
    let mut writer = BitWriter::default();
    writer.byte(compression_type);

    for &byte in data {
        if tree.items_by_byte[usize::from(byte)].is_none() {
            tree.encode_symbol(&mut writer, SYMBOL_NEW_BYTE)?;
            writer.byte(byte);
            tree.insert_new_branch(byte)?;
            tree.record(byte);
        } else {
            tree.encode_symbol(&mut writer, u16::from(byte))?;
            if tree.adaptive {
                tree.record(byte);
            }
        }
    }

    tree.encode_symbol(&mut writer, SYMBOL_END)?;
    Ok(writer.finish())
}
