//! Huffman literal decoding.
//!
//! The decoding table is indexed by the next `table_log` bits of the
//! stream; every symbol with weight `w` owns `1 << (w - 1)` consecutive
//! cells and consumes `table_log + 1 - w` bits.

use tessera_core::{Error, Result};

use super::{MAX_FSE_TABLE_LOG, MAX_SYMBOL, MAX_TABLE_LOG, MAX_TABLE_SIZE};
use crate::bits::{highest_bit, read_u16_le, BitReader};
use crate::fse::{self, FseTable};

/// Huffman decoding table plus the scratch used to read its description.
///
/// A table stays loaded across blocks of the same frame so that
/// "treeless" literal sections can reuse it.
#[derive(Debug, Clone)]
pub struct HuffmanDecoder {
    symbols: [u8; MAX_TABLE_SIZE],
    number_of_bits: [u8; MAX_TABLE_SIZE],
    table_log: Option<u32>,

    weights: [u8; MAX_SYMBOL + 2],
    ranks: [u32; MAX_TABLE_LOG as usize + 1],
    weights_table: FseTable,
}

impl Default for HuffmanDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanDecoder {
    pub fn new() -> Self {
        Self {
            symbols: [0; MAX_TABLE_SIZE],
            number_of_bits: [0; MAX_TABLE_SIZE],
            table_log: None,
            weights: [0; MAX_SYMBOL + 2],
            ranks: [0; MAX_TABLE_LOG as usize + 1],
            weights_table: FseTable::with_capacity(MAX_FSE_TABLE_LOG),
        }
    }

    /// Whether a table has been read since the last reset.
    pub fn is_loaded(&self) -> bool {
        self.table_log.is_some()
    }

    /// Forget the current table.
    pub fn reset(&mut self) {
        self.table_log = None;
    }

    /// Parse a table description from the start of `input` and build the
    /// decoding table. Returns the number of bytes consumed.
    pub fn read_table(&mut self, input: &[u8]) -> Result<usize> {
        self.ranks.fill(0);

        let Some(&header) = input.first() else {
            return Err(Error::corrupted("Not enough input bytes"));
        };

        let (input_size, output_size) = if header >= 128 {
            // Direct representation: two 4-bit weights per byte
            let output_size = (header - 127) as usize;
            let input_size = (output_size + 1) / 2;
            if input_size + 1 > input.len() {
                return Err(Error::corrupted_at("Not enough input bytes", 1));
            }
            for (i, &byte) in input[1..=input_size].iter().enumerate() {
                self.weights[2 * i] = byte >> 4;
                self.weights[2 * i + 1] = byte & 0xF;
            }
            (input_size, output_size)
        } else {
            let input_size = header as usize;
            if input_size + 1 > input.len() {
                return Err(Error::corrupted_at("Not enough input bytes", 1));
            }
            let compressed = &input[1..=input_size];
            let header_size = self.weights_table.read(compressed, fse::MAX_SYMBOL, MAX_FSE_TABLE_LOG)?;
            let output_size = fse::decompress(
                self.weights_table.as_table_ref(),
                &compressed[header_size..],
                &mut self.weights[..=MAX_SYMBOL],
            )?;
            (input_size, output_size)
        };

        // The last weight is implied, so at most 255 are stored
        if output_size > MAX_SYMBOL {
            return Err(Error::corrupted("Too many Huffman weights"));
        }

        let mut total_weight = 0u32;
        for &weight in &self.weights[..output_size] {
            if weight as u32 > MAX_TABLE_LOG {
                return Err(Error::corrupted("Huffman weight out of range"));
            }
            self.ranks[weight as usize] += 1;
            total_weight += (1 << weight) >> 1;
        }
        if total_weight == 0 {
            return Err(Error::corrupted("Input is corrupted"));
        }

        let table_log = highest_bit(total_weight) + 1;
        if table_log > MAX_TABLE_LOG {
            return Err(Error::corrupted("Huffman table log too large"));
        }

        // The implied weight completes the total to a power of two
        let rest = (1 << table_log) - total_weight;
        if !rest.is_power_of_two() {
            return Err(Error::corrupted("Input is corrupted"));
        }
        let last_weight = highest_bit(rest) + 1;
        self.weights[output_size] = last_weight as u8;
        self.ranks[last_weight as usize] += 1;

        // Convert rank counts to starting cells
        let mut next_rank_start = 0;
        for i in 1..=table_log as usize {
            let current = next_rank_start;
            next_rank_start += self.ranks[i] << (i - 1);
            self.ranks[i] = current;
        }

        for (symbol, &weight) in self.weights[..=output_size].iter().enumerate() {
            let length = ((1u32 << weight) >> 1) as usize;
            let start = self.ranks[weight as usize] as usize;
            let number_of_bits = (table_log + 1 - weight as u32) as u8;
            self.symbols[start..start + length].fill(symbol as u8);
            self.number_of_bits[start..start + length].fill(number_of_bits);
            self.ranks[weight as usize] += length as u32;
        }

        // At least two symbols of the longest code length, in pairs
        if self.ranks[1] < 2 || self.ranks[1] & 1 != 0 {
            return Err(Error::corrupted("Input is corrupted"));
        }

        self.table_log = Some(table_log);
        Ok(input_size + 1)
    }

    fn loaded_table_log(&self) -> Result<u32> {
        self.table_log
            .ok_or_else(|| Error::corrupted("Huffman table has not been loaded"))
    }

    #[inline]
    fn decode_symbol(&self, reader: &mut BitReader<'_>, table_log: u32) -> u8 {
        let value = reader.peek_fast(table_log) as usize;
        reader.skip_bits(self.number_of_bits[value] as u32);
        self.symbols[value]
    }

    /// Decode one stream filling all of `output`.
    pub fn decode_single_stream(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        let table_log = self.loaded_table_log()?;
        let mut reader = BitReader::new(input)?;

        let limit = output.len();
        let mut position = 0;
        while position + 4 < limit {
            if reader.refill() {
                break;
            }
            for slot in &mut output[position..position + 4] {
                *slot = self.decode_symbol(&mut reader, table_log);
            }
            position += 4;
        }

        self.decode_tail(&mut reader, table_log, &mut output[position..])
    }

    /// Decode four streams behind a 6-byte jump table; each of the first
    /// three fills a quarter of `output` (rounded up), the last the rest.
    pub fn decode_4_streams(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        let table_log = self.loaded_table_log()?;
        // Jump table plus one byte per stream
        if input.len() < 10 {
            return Err(Error::corrupted("Input is corrupted"));
        }

        let start1 = 6;
        let start2 = start1 + read_u16_le(input, 0) as usize;
        let start3 = start2 + read_u16_le(input, 2) as usize;
        let start4 = start3 + read_u16_le(input, 4) as usize;
        if start4 >= input.len() {
            return Err(Error::corrupted_at("Huffman jump table out of range", 0));
        }

        let mut readers = [
            BitReader::new(&input[start1..start2])?,
            BitReader::new(&input[start2..start3])?,
            BitReader::new(&input[start3..start4])?,
            BitReader::new(&input[start4..])?,
        ];

        let limit = output.len();
        let segment = (limit + 3) / 4;
        if 3 * segment > limit {
            return Err(Error::corrupted("Too few literals for four streams"));
        }
        let starts = [0, segment, 2 * segment, 3 * segment];
        let mut positions = starts;

        // Four symbols from each stream between reloads
        'fast: while positions[3] + 7 < limit {
            for offset in 0..4 {
                for (reader, &position) in readers.iter_mut().zip(positions.iter()) {
                    output[position + offset] = self.decode_symbol(reader, table_log);
                }
            }
            for position in &mut positions {
                *position += 4;
            }
            for reader in &mut readers {
                if reader.refill() {
                    break 'fast;
                }
            }
        }

        if positions[0] > starts[1] || positions[1] > starts[2] || positions[2] > starts[3] {
            return Err(Error::corrupted("Input is corrupted"));
        }

        let ends = [starts[1], starts[2], starts[3], limit];
        for (i, reader) in readers.iter_mut().enumerate() {
            self.decode_tail(reader, table_log, &mut output[positions[i]..ends[i]])?;
        }
        Ok(())
    }

    /// Finish a stream: decode with reloads while the stream has bits,
    /// then without, and require every bit to be consumed.
    fn decode_tail(&self, reader: &mut BitReader<'_>, table_log: u32, output: &mut [u8]) -> Result<()> {
        let mut position = 0;
        while position < output.len() {
            if reader.refill() {
                break;
            }
            output[position] = self.decode_symbol(reader, table_log);
            position += 1;
        }
        for slot in &mut output[position..] {
            *slot = self.decode_symbol(reader, table_log);
        }

        if !reader.is_end_of_stream() {
            return Err(Error::corrupted("Bit stream is not fully consumed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_direct_weights() {
        // Weights for symbols 0..=2: 1, 1, 2; the implied symbol 3 takes
        // weight 3 to complete the total of 8
        let description = [127 + 3, 0x11, 0x20];
        let mut decoder = HuffmanDecoder::new();
        assert_eq!(decoder.read_table(&description).unwrap(), 3);
        assert!(decoder.is_loaded());

        assert_eq!(decoder.loaded_table_log().unwrap(), 3);
        assert_eq!(&decoder.symbols[..8], &[0, 1, 2, 2, 3, 3, 3, 3]);
        assert_eq!(&decoder.number_of_bits[..8], &[3, 3, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn test_unloaded_table_rejected() {
        let decoder = HuffmanDecoder::new();
        let mut output = [0u8; 4];
        assert!(decoder.decode_single_stream(&[0x80], &mut output).is_err());
    }

    #[test]
    fn test_reset_unloads() {
        let mut decoder = HuffmanDecoder::new();
        decoder.read_table(&[127 + 3, 0x11, 0x20]).unwrap();
        decoder.reset();
        assert!(!decoder.is_loaded());
    }

    #[test]
    fn test_truncated_description_rejected() {
        let mut decoder = HuffmanDecoder::new();
        assert!(decoder.read_table(&[]).is_err());
        assert!(decoder.read_table(&[127 + 8, 0x11]).is_err());
        assert!(decoder.read_table(&[20, 0x00, 0x01]).is_err());
    }

    #[test]
    fn test_weights_without_pair_of_longest_codes_rejected() {
        // Weights 2, 2 and the implied 3: no weight-1 symbol at all
        let mut decoder = HuffmanDecoder::new();
        assert!(decoder.read_table(&[127 + 2, 0x22]).is_err());
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let mut decoder = HuffmanDecoder::new();
        assert!(decoder.read_table(&[127 + 4, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_four_streams_short_input_rejected() {
        let mut decoder = HuffmanDecoder::new();
        decoder.read_table(&[127 + 3, 0x11, 0x20]).unwrap();
        let mut output = [0u8; 32];
        assert!(decoder.decode_4_streams(&[0u8; 9], &mut output).is_err());
        // Jump table pointing past the end
        let bogus = [0xFF, 0x00, 0x01, 0x00, 0x01, 0x00, 0x80, 0x80, 0x80, 0x80];
        assert!(decoder.decode_4_streams(&bogus, &mut output).is_err());
    }
}
