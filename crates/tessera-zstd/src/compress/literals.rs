//! Literals section encoding.
//!
//! Literals are stored raw, as a single repeated byte, or Huffman coded.
//! A Huffman table from an earlier block of the frame may be reused
//! (treeless section) when that is cheaper than sending a new one.

use tessera_core::{Error, Result};
use tracing::trace;

use super::parameters::Strategy;
use crate::bits::{write_u16_le, write_u24_le, write_u32_le};
use crate::block::LiteralsBlockType;
use crate::histogram;
use crate::huffman::{
    compress_4_streams, compress_single_stream, HuffmanCompressionTable, HuffmanWorkspace,
    MAX_SYMBOL, MAX_SYMBOL_COUNT,
};

/// Below this many literals Huffman coding is not attempted.
const MIN_HUFFMAN_LITERALS: usize = 63;

/// Longest code the encoder builds.
const MAX_HUFFMAN_BITS: u32 = 11;

/// Bytes a block must save to be worth compressing.
pub fn minimum_gain(size: usize, strategy: Strategy) -> usize {
    let shift = if strategy == Strategy::BtUltra { 7 } else { 6 };
    (size >> shift) + 2
}

/// Huffman state carried across the blocks of one frame.
#[derive(Debug, Clone)]
pub struct LiteralsEncoder {
    previous: HuffmanCompressionTable,
    has_previous: bool,
    candidate: HuffmanCompressionTable,
    /// The last encoded section carries `candidate`.
    candidate_pending: bool,
    workspace: HuffmanWorkspace,
    counts: [u32; MAX_SYMBOL_COUNT],
}

impl Default for LiteralsEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LiteralsEncoder {
    pub fn new() -> Self {
        Self {
            previous: HuffmanCompressionTable::new(),
            has_previous: false,
            candidate: HuffmanCompressionTable::new(),
            candidate_pending: false,
            workspace: HuffmanWorkspace::default(),
            counts: [0; MAX_SYMBOL_COUNT],
        }
    }

    /// Keep the table of the last encoded section for later blocks. Called
    /// once the block is emitted compressed.
    pub fn commit(&mut self) {
        if self.candidate_pending {
            core::mem::swap(&mut self.previous, &mut self.candidate);
            self.has_previous = true;
            self.candidate_pending = false;
        }
    }

    /// Encode `literals` into `output`; returns the section size.
    ///
    /// `bypass` stores the literals raw without trying anything else.
    pub fn encode(
        &mut self,
        output: &mut [u8],
        literals: &[u8],
        strategy: Strategy,
        bypass: bool,
    ) -> Result<usize> {
        self.candidate_pending = false;

        let size = literals.len();
        if bypass || size <= MIN_HUFFMAN_LITERALS {
            return encode_raw_literals(output, literals);
        }

        let header_size = 3 + usize::from(size >= 1024) + usize::from(size >= 16384);
        if output.len() < header_size + 1 {
            return Err(Error::buffer_too_small(header_size + 1, output.len()));
        }

        histogram::count(literals, &mut self.counts);
        let max_symbol = histogram::find_max_symbol(&self.counts, MAX_SYMBOL);
        let largest = histogram::find_largest_count(&self.counts, max_symbol) as usize;

        if largest == size {
            return encode_rle_literals(output, literals[0], size);
        }
        if largest <= (size >> 7) + 4 {
            // Too flat to gain anything
            return encode_raw_literals(output, literals);
        }

        let can_reuse = self.has_previous && self.previous.is_valid(&self.counts, max_symbol);
        let prefer_reuse = strategy < Strategy::Lazy && size <= 1024;

        let mut reuse = can_reuse && prefer_reuse;
        let mut table_size = 0;
        if !reuse {
            let max_bits = HuffmanCompressionTable::optimal_number_of_bits(MAX_HUFFMAN_BITS, size, max_symbol)?;
            self.candidate
                .initialize(&self.counts, max_symbol, max_bits, &mut self.workspace)?;

            table_size = match self.candidate.write(&mut output[header_size..], &mut self.workspace) {
                Ok(written) => written,
                Err(_) => return encode_raw_literals(output, literals),
            };

            if can_reuse {
                let previous_estimate = self.previous.estimate_compressed_size(&self.counts, max_symbol);
                let candidate_estimate = self.candidate.estimate_compressed_size(&self.counts, max_symbol);
                if previous_estimate <= table_size + candidate_estimate {
                    reuse = true;
                    table_size = 0;
                }
            }
        }

        let table = if reuse { &self.previous } else { &self.candidate };
        let streams = &mut output[header_size + table_size..];
        let single_stream = size < 256;
        let compressed = if single_stream {
            compress_single_stream(streams, literals, table)?
        } else {
            compress_4_streams(streams, literals, table)?
        };

        let total = table_size + compressed;
        if compressed == 0 || total >= size - minimum_gain(size, strategy) {
            trace!(size, total, "Huffman literals not worth it");
            return encode_raw_literals(output, literals);
        }

        let block_type = if reuse {
            LiteralsBlockType::Treeless as u32
        } else {
            LiteralsBlockType::Compressed as u32
        };
        let size = size as u32;
        let total = total as u32;
        match header_size {
            3 => {
                let format = u32::from(!single_stream);
                write_u24_le(output, 0, block_type | format << 2 | size << 4 | total << 14);
            }
            4 => write_u32_le(output, 0, block_type | 2 << 2 | size << 4 | total << 18),
            _ => {
                write_u32_le(output, 0, block_type | 3 << 2 | size << 4 | total << 22);
                output[4] = (total >> 10) as u8;
            }
        }

        self.candidate_pending = !reuse;
        trace!(size, total, reuse, "Huffman literals");
        Ok(header_size + total as usize)
    }
}

/// Store literals as they are.
pub fn encode_raw_literals(output: &mut [u8], literals: &[u8]) -> Result<usize> {
    let size = literals.len();
    let header_size = literals_header(output, LiteralsBlockType::Raw, size, size)?;
    output[header_size..header_size + size].copy_from_slice(literals);
    Ok(header_size + size)
}

/// Store `size` copies of `value`.
pub fn encode_rle_literals(output: &mut [u8], value: u8, size: usize) -> Result<usize> {
    let header_size = literals_header(output, LiteralsBlockType::Rle, size, 1)?;
    output[header_size] = value;
    Ok(header_size + 1)
}

/// Write a raw or RLE header for `size` literals followed by `payload`
/// bytes; returns the header size.
fn literals_header(output: &mut [u8], block_type: LiteralsBlockType, size: usize, payload: usize) -> Result<usize> {
    let header_size = 1 + usize::from(size > 31) + usize::from(size > 4095);
    if output.len() < header_size + payload {
        return Err(Error::buffer_too_small(header_size + payload, output.len()));
    }

    let block_type = block_type as u32;
    let size = size as u32;
    match header_size {
        1 => output[0] = (block_type | size << 3) as u8,
        2 => write_u16_le(output, 0, (block_type | 1 << 2 | size << 4) as u16),
        _ => write_u24_le(output, 0, block_type | 3 << 2 | size << 4),
    }
    Ok(header_size)
}
