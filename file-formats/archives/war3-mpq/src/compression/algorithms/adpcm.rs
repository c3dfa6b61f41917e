//! IMA ADPCM codec for 16-bit PCM sound sectors
//!
//! The stream starts with a zero byte and the bit shift, followed by one raw
//! 16-bit sample per channel. Every following byte is either an encoded delta
//! or one of two step-index control codes (`0x80` shrink, `0x81` grow).

use crate::{Error, Result};

const MAX_CHANNELS: usize = 2;
const INITIAL_STEP_INDEX: usize = 0x2C;
const MAX_STEP_INDEX: usize = 0x58;

/// Compression level used by the sector encoder
pub(crate) const DEFAULT_LEVEL: u8 = 5;

const SHRINK_STEP: u8 = 0x80;
const GROW_STEP: u8 = 0x81;
const SIGN_BIT: u8 = 0x40;

const NEXT_STEP_TABLE: [i8; 32] = [
    -1, 0, -1, 4, -1, 2, -1, 6, -1, 1, -1, 5, -1, 3, -1, 7, -1, 1, -1, 5, -1, 3, -1, 7, -1, 2, -1,
    4, -1, 6, -1, 8,
];

const STEP_SIZE_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449,
    494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272,
    2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493,
    10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

#[derive(Debug, Clone, Copy)]
struct Channel {
    predicted: i32,
    step_index: usize,
}

impl Channel {
    fn new(sample: i16) -> Self {
        Self {
            predicted: i32::from(sample),
            step_index: INITIAL_STEP_INDEX,
        }
    }

    fn step_size(&self) -> i32 {
        STEP_SIZE_TABLE[self.step_index]
    }

    fn shrink_step(&mut self) {
        self.step_index = self.step_index.saturating_sub(1);
    }

    fn grow_step(&mut self) {
        self.step_index = (self.step_index + 8).min(MAX_STEP_INDEX);
    }

    fn advance_step(&mut self, encoded: u8) {
        let change = NEXT_STEP_TABLE[usize::from(encoded & 0x1F)];
        self.step_index = (self.step_index as i32 + i32::from(change)).clamp(0, 88) as usize;
    }

    fn apply(&mut self, encoded: u8, difference: i32) {
        let next = if encoded & SIGN_BIT != 0 {
            self.predicted - difference
        } else {
            self.predicted + difference
        };
        self.predicted = next.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
    }

    fn sample(&self) -> i16 {
        self.predicted as i16
    }
}

fn check_channels(channel_count: usize) -> Result<()> {
    if channel_count == 0 || channel_count > MAX_CHANNELS {
        return Err(Error::compression(format!(
            "Invalid channel count: {channel_count}. ADPCM supports 1-{MAX_CHANNELS} channels"
        )));
    }
    Ok(())
}

fn push_sample(output: &mut Vec<u8>, sample: i16) {
    output.extend_from_slice(&sample.to_le_bytes());
}

/// Compress mono 16-bit samples
pub(crate) fn compress_mono(input: &[u8], level: u8) -> Result<Vec<u8>> {
    compress(input, level, 1)
}

/// Compress interleaved stereo 16-bit samples
pub(crate) fn compress_stereo(input: &[u8], level: u8) -> Result<Vec<u8>> {
    compress(input, level, 2)
}

fn compress(input: &[u8], level: u8, channel_count: usize) -> Result<Vec<u8>> {
    check_channels(channel_count)?;
    if input.len() % 2 != 0 {
        return Err(Error::compression("ADPCM input must be 16-bit aligned"));
    }

    let samples: Vec<i16> = input
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if samples.len() < channel_count {
        return Err(Error::compression("Not enough samples for every channel"));
    }

    let level = level.clamp(1, 6);
    let bit_shift = level - 1;
    let max_bit_mask: u8 = if bit_shift > 0 {
        (1u8 << (bit_shift - 1)).min(0x20)
    } else {
        0
    };

    let mut output = Vec::with_capacity(input.len() / 2 + 8);
    output.push(0);
    output.push(bit_shift);

    let mut channels: Vec<Channel> = samples[..channel_count]
        .iter()
        .map(|&sample| {
            push_sample(&mut output, sample);
            Channel::new(sample)
        })
        .collect();

    for (index, &sample) in samples.iter().enumerate().skip(channel_count) {
        let channel = &mut channels[index % channel_count];

        let mut encoded = 0u8;
        let mut distance = i32::from(sample) - channel.predicted;
        if distance < 0 {
            distance = -distance;
            encoded |= SIGN_BIT;
        }

        let mut step = channel.step_size();
        if distance < (step >> level) {
            channel.shrink_step();
            output.push(SHRINK_STEP);
            continue;
        }

        while distance > (step << 1) && channel.step_index < MAX_STEP_INDEX {
            channel.grow_step();
            step = channel.step_size();
            output.push(GROW_STEP);
        }

        let base = step >> bit_shift;
        let mut total = 0;
        let mut bit = 0x01u8;
        let mut work = step;
        while bit != 0 && bit <= max_bit_mask {
            if total + work <= distance {
                total += work;
                encoded |= bit;
            }
            work >>= 1;
            bit <<= 1;
        }

        channel.apply(encoded, base + total);
        output.push(encoded);
        channel.advance_step(encoded);
    }

    Ok(output)
}

/// Decompress into mono 16-bit samples
pub(crate) fn decompress_mono(input: &[u8], output_size: usize) -> Result<Vec<u8>> {
    decompress(input, output_size, 1)
}

/// Decompress into interleaved stereo 16-bit samples
pub(crate) fn decompress_stereo(input: &[u8], output_size: usize) -> Result<Vec<u8>> {
    decompress(input, output_size, 2)
}

fn decompress(input: &[u8], output_size: usize, channel_count: usize) -> Result<Vec<u8>> {
    check_channels(channel_count)?;
    if input.is_empty() && output_size == 0 {
        return Ok(Vec::new());
    }

    let header_len = 2 + 2 * channel_count;
    if input.len() < header_len {
        return Err(Error::compression("Input too small for ADPCM"));
    }

    let bit_shift = u32::from(input[1]).min(31);
    let mut output = Vec::with_capacity(output_size);

    let mut channels: Vec<Channel> = input[2..header_len]
        .chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            push_sample(&mut output, sample);
            Channel::new(sample)
        })
        .collect();

    let mut channel_index = channel_count - 1;
    for &encoded in &input[header_len..] {
        if output.len() >= output_size {
            break;
        }
        channel_index = (channel_index + 1) % channel_count;
        let channel = &mut channels[channel_index];

        match encoded {
            SHRINK_STEP => {
                channel.shrink_step();
                push_sample(&mut output, channel.sample());
            }
            GROW_STEP => {
                channel.grow_step();
                // The next byte still belongs to this channel
                channel_index = (channel_index + channel_count - 1) % channel_count;
            }
            _ => {
                let step = channel.step_size();
                let mut difference = step >> bit_shift;
                for bit in 0..6 {
                    if encoded & (1 << bit) != 0 {
                        difference += step >> bit;
                    }
                }
                channel.apply(encoded, difference);
                push_sample(&mut output, channel.sample());
                channel.advance_step(encoded);
            }
        }
    }

    output.truncate(output_size);
    Ok(output)
}
