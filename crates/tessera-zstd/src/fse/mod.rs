//! Finite State Entropy (FSE) coding.
//!
//! FSE is the table-driven entropy coder used throughout Zstandard, a
//! variant of ANS (Asymmetric Numeral Systems). It carries the sequence
//! codes of compressed blocks and the weights of Huffman tables.
//!
//! ## Overview
//!
//! - [`normalize_counts`] scales a histogram to the table size
//! - [`write_normalized_counts`] / [`read_normalized_counts`] serialize it
//! - [`FseTable`] decodes, [`FseCompressionTable`] encodes
//! - [`compress`] / [`decompress`] run two interleaved states over one
//!   bitstream
//!
//! The built-in sequence tables are compile-time constants.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.1](https://datatracker.ietf.org/doc/html/rfc8878#section-4.1)

mod encoder;
mod header;
mod normalize;
mod table;

use tessera_core::{Error, Result};

use crate::bits::{BitReader, BitWriter};

pub use encoder::FseCompressionTable;
pub use header::{read_normalized_counts, write_normalized_counts, TableHeader};
pub use normalize::{min_table_log, normalize_counts, optimal_table_log};
pub use table::{
    FseEntry, FseTable, FseTableRef, DEFAULT_LITERAL_LENGTH_TABLE, DEFAULT_MATCH_LENGTH_TABLE,
    DEFAULT_OFFSET_CODE_TABLE,
};

/// Largest symbol value an FSE table may describe.
pub const MAX_SYMBOL: usize = 255;

/// Smallest supported table log.
pub const MIN_TABLE_LOG: u32 = 5;

/// Largest supported table log.
pub const MAX_TABLE_LOG: u32 = 12;

/// Largest table size, in states.
pub const MAX_TABLE_SIZE: usize = 1 << MAX_TABLE_LOG;

/// Default distribution for literal length codes (table log 6).
/// From RFC 8878 Section 3.1.1.3.2.2.1
pub const LITERAL_LENGTH_DEFAULT_DISTRIBUTION: [i16; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];

/// Default distribution for match length codes (table log 6).
/// From RFC 8878 Section 3.1.1.3.2.2.2
pub const MATCH_LENGTH_DEFAULT_DISTRIBUTION: [i16; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
];

/// Default distribution for offset codes (table log 5).
/// From RFC 8878 Section 3.1.1.3.2.2.3
pub const OFFSET_DEFAULT_DISTRIBUTION: [i16; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];

/// Place every symbol's cells in a table of `1 << table_log` states.
///
/// Low-probability (`-1`) symbols fill the top cells in symbol order; the
/// others are written `(size >> 1) + (size >> 3) + 3` cells apart, skipping
/// the top. Returns the cell symbols and the final walk position, which is
/// 0 for a well-formed distribution and non-zero otherwise.
pub(crate) const fn spread_symbols(
    normalized: &[i16],
    max_symbol: usize,
    table_log: u32,
) -> ([u8; MAX_TABLE_SIZE], usize) {
    let table_size = 1usize << table_log;
    let mut symbols = [0u8; MAX_TABLE_SIZE];

    // One past the highest cell left for spreading
    let mut high_threshold = table_size;
    let mut symbol = 0;
    while symbol <= max_symbol {
        if normalized[symbol] == -1 {
            if high_threshold == 0 {
                return (symbols, usize::MAX);
            }
            high_threshold -= 1;
            symbols[high_threshold] = symbol as u8;
        }
        symbol += 1;
    }

    let mask = table_size - 1;
    let step = (table_size >> 1) + (table_size >> 3) + 3;
    let mut position = 0;
    symbol = 0;
    while symbol <= max_symbol {
        let mut remaining = normalized[symbol];
        while remaining > 0 {
            if high_threshold == 0 {
                return (symbols, usize::MAX);
            }
            symbols[position] = symbol as u8;
            loop {
                position = (position + step) & mask;
                if position < high_threshold {
                    break;
                }
            }
            remaining -= 1;
        }
        symbol += 1;
    }
    (symbols, position)
}

/// Encode `input` with two interleaved states and return the stream size,
/// or 0 when the input is too short to be worth it.
pub fn compress(output: &mut [u8], input: &[u8], table: &FseCompressionTable) -> Result<usize> {
    if output.len() < 8 {
        return Err(Error::buffer_too_small(8, output.len()));
    }
    if input.len() <= 2 {
        return Ok(0);
    }

    let mut writer = BitWriter::new(output)?;

    // Symbols are encoded last to first so the decoder reads them in order
    let mut position = input.len();
    let mut previous = || {
        position -= 1;
        input[position]
    };

    let mut state1;
    let mut state2;
    if input.len() & 1 != 0 {
        state1 = table.begin(previous());
        state2 = table.begin(previous());
        state1 = table.encode(&mut writer, state1, previous());
        writer.flush();
    } else {
        state2 = table.begin(previous());
        state1 = table.begin(previous());
    }

    // Align the rest on a multiple of 4
    if (input.len() - 2) & 2 != 0 {
        state2 = table.encode(&mut writer, state2, previous());
        state1 = table.encode(&mut writer, state1, previous());
        writer.flush();
    }

    for _ in 0..(input.len() - 2) / 4 {
        state2 = table.encode(&mut writer, state2, previous());
        state1 = table.encode(&mut writer, state1, previous());
        state2 = table.encode(&mut writer, state2, previous());
        state1 = table.encode(&mut writer, state1, previous());
        writer.flush();
    }

    table.finish(&mut writer, state2);
    table.finish(&mut writer, state1);
    writer.close()
}

/// Decode a two-state stream produced by [`compress`] into `output`.
/// Returns the number of symbols decoded.
pub fn decompress(table: FseTableRef<'_>, input: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut reader = BitReader::new(input)?;
    let log2_size = table.log2_size;

    let mut state1 = reader.read_bits(log2_size) as usize;
    reader.refill();
    let mut state2 = reader.read_bits(log2_size) as usize;
    reader.refill();

    let limit = output.len();
    let mut position = 0;

    // Four symbols per reload
    while position + 4 <= limit {
        for i in 0..4 {
            let state = if i & 1 == 0 { &mut state1 } else { &mut state2 };
            let entry = table.entry(*state);
            output[position + i] = entry.symbol;
            *state = entry.new_state as usize + reader.read_bits(entry.number_of_bits as u32) as usize;
        }
        position += 4;
        if reader.refill() {
            break;
        }
    }

    // Tail: alternate states until the stream runs dry, then emit the
    // symbol held by the other state
    loop {
        if position + 2 > limit {
            return Err(Error::corrupted("Output buffer is too small"));
        }
        let entry = table.entry(state1);
        output[position] = entry.symbol;
        position += 1;
        state1 = entry.new_state as usize + reader.read_bits(entry.number_of_bits as u32) as usize;
        reader.refill();
        if reader.is_overflow() {
            output[position] = table.entry(state2).symbol;
            position += 1;
            break;
        }

        if position + 2 > limit {
            return Err(Error::corrupted("Output buffer is too small"));
        }
        let entry = table.entry(state2);
        output[position] = entry.symbol;
        position += 1;
        state2 = entry.new_state as usize + reader.read_bits(entry.number_of_bits as u32) as usize;
        reader.refill();
        if reader.is_overflow() {
            output[position] = table.entry(state1).symbol;
            position += 1;
            break;
        }
    }

    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn occupancy(distribution: &[i16]) -> i32 {
        distribution.iter().map(|&f| (f as i32).abs()).sum()
    }

    #[test]
    fn test_default_distributions_fill_tables() {
        assert_eq!(occupancy(&LITERAL_LENGTH_DEFAULT_DISTRIBUTION), 64);
        assert_eq!(occupancy(&MATCH_LENGTH_DEFAULT_DISTRIBUTION), 64);
        assert_eq!(occupancy(&OFFSET_DEFAULT_DISTRIBUTION), 32);
    }

    #[test]
    fn test_spread_returns_to_origin() {
        let (_, position) = spread_symbols(&MATCH_LENGTH_DEFAULT_DISTRIBUTION, 52, 6);
        assert_eq!(position, 0);
        // One cell short: the walk cannot close
        let mut short = LITERAL_LENGTH_DEFAULT_DISTRIBUTION;
        short[0] -= 1;
        let (_, position) = spread_symbols(&short, 35, 6);
        assert_ne!(position, 0);
    }

    /// Normalize, serialize, parse back and decode `input`; returns the
    /// table log used.
    fn roundtrip(input: &[u8], max_table_log: u32) -> u32 {
        let mut counts = [0u32; 256];
        histogram::count(input, &mut counts);
        let max_symbol = histogram::find_max_symbol(&counts, 255);
        let table_log = optimal_table_log(max_table_log, input.len(), max_symbol).unwrap();
        let mut normalized = [0i16; 256];
        normalize_counts(&mut normalized, table_log, &counts, input.len(), max_symbol).unwrap();

        let mut header = [0u8; 512];
        let header_size =
            write_normalized_counts(&mut header, &normalized, max_symbol, table_log).unwrap();

        let encoder = FseCompressionTable::new(&normalized, max_symbol, table_log);
        let mut compressed = vec![0u8; input.len() * 2 + 16];
        let size = compress(&mut compressed, input, &encoder).unwrap();
        assert!(size > 0);

        let mut header_and_data = header[..header_size].to_vec();
        header_and_data.extend_from_slice(&compressed[..size]);
        let mut decoder = FseTable::with_capacity(MAX_TABLE_LOG);
        let consumed = decoder
            .read(&header_and_data, max_symbol, MAX_TABLE_LOG)
            .unwrap();
        assert_eq!(consumed, header_size);

        // The tail loop needs one spare slot
        let mut decoded = vec![0u8; input.len() + 1];
        let n = decompress(decoder.as_table_ref(), &header_and_data[consumed..], &mut decoded).unwrap();
        assert_eq!(&decoded[..n], input);
        table_log
    }

    #[test]
    fn test_roundtrip_text() {
        let text = b"it was the best of times, it was the worst of times, it was the age of wisdom";
        roundtrip(text, 9);
    }

    #[test]
    fn test_roundtrip_every_length_parity() {
        // Odd/even lengths and both alignment paths of the encoder
        let mut rng = StdRng::seed_from_u64(7);
        for len in 3..40 {
            let input: Vec<u8> = (0..len).map(|_| rng.gen_range(0..6u8)).collect();
            let distinct = input.iter().collect::<std::collections::HashSet<_>>().len();
            if distinct > 1 {
                roundtrip(&input, MAX_TABLE_LOG);
            }
        }
    }

    #[test]
    fn test_roundtrip_table_log_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let small_alphabet: Vec<u8> = (0..200).map(|_| rng.gen_range(0..4u8)).collect();
        assert_eq!(roundtrip(&small_alphabet, MIN_TABLE_LOG), MIN_TABLE_LOG);

        let skewed: Vec<u8> = (0..20_000)
            .map(|_| if rng.gen_bool(0.8) { 0 } else { rng.gen_range(0..40u8) })
            .collect();
        assert_eq!(roundtrip(&skewed, MAX_TABLE_LOG), MAX_TABLE_LOG);
    }

    #[test]
    fn test_compress_rejects_small_output() {
        let table = FseCompressionTable::new(&OFFSET_DEFAULT_DISTRIBUTION, 28, 5);
        let mut output = [0u8; 7];
        assert!(compress(&mut output, &[1, 2, 3], &table).is_err());
    }

    #[test]
    fn test_compress_skips_tiny_input() {
        let table = FseCompressionTable::new(&OFFSET_DEFAULT_DISTRIBUTION, 28, 5);
        let mut output = [0u8; 16];
        assert_eq!(compress(&mut output, &[1, 2], &table).unwrap(), 0);
    }

    #[test]
    fn test_decompress_detects_small_output() {
        let table = FseCompressionTable::new(&OFFSET_DEFAULT_DISTRIBUTION, 28, 5);
        let input: Vec<u8> = (0..50u8).map(|i| i % 20).collect();
        let mut compressed = [0u8; 128];
        let size = compress(&mut compressed, &input, &table).unwrap();
        let mut decoded = [0u8; 10];
        assert!(decompress(DEFAULT_OFFSET_CODE_TABLE, &compressed[..size], &mut decoded).is_err());
    }
}
