//! Sequences section encoding.
//!
//! ```text
//! Number_of_Sequences   1-3 bytes
//! Symbol compression    1 byte: LL mode << 6 | OF mode << 4 | ML mode << 2
//! FSE table headers     for each compressed stream, in LL, OF, ML order
//! Bitstream             backward, states of the three code streams
//!                       interleaved with every sequence's extra bits
//! ```
//!
//! Each code stream picks its own mode. Fast strategies use a count
//! threshold to choose between the predefined table and a new one; lazy
//! and stronger strategies compare estimated costs of every mode,
//! including reuse of the table sent by an earlier block.

use tessera_core::{Error, Result};
use tracing::trace;

use super::parameters::Strategy;
use super::store::SequenceStore;
use crate::bits::{write_u16_le, BitWriter};
use crate::block::{
    SymbolEncodingType, DEFAULT_MAX_OFFSET_CODE_SYMBOL, LITERAL_LENGTH_BITS, LITERAL_LENGTH_TABLE_LOG,
    LONG_NUMBER_OF_SEQUENCES, MATCH_LENGTH_BITS, MATCH_LENGTH_TABLE_LOG, MAX_LITERAL_LENGTH_SYMBOL,
    MAX_MATCH_LENGTH_SYMBOL, MAX_OFFSET_CODE_SYMBOL, OFFSET_TABLE_LOG,
};
use crate::fse::{
    normalize_counts, optimal_table_log, write_normalized_counts, FseCompressionTable,
    LITERAL_LENGTH_DEFAULT_DISTRIBUTION, MATCH_LENGTH_DEFAULT_DISTRIBUTION, OFFSET_DEFAULT_DISTRIBUTION,
};
use crate::histogram;

const LITERAL_LENGTH_DEFAULT_LOG: u32 = 6;
const MATCH_LENGTH_DEFAULT_LOG: u32 = 6;
const OFFSET_DEFAULT_LOG: u32 = 5;

static LITERAL_LENGTH_DEFAULT_TABLE: FseCompressionTable = FseCompressionTable::new(
    &LITERAL_LENGTH_DEFAULT_DISTRIBUTION,
    MAX_LITERAL_LENGTH_SYMBOL,
    LITERAL_LENGTH_DEFAULT_LOG,
);
static MATCH_LENGTH_DEFAULT_TABLE: FseCompressionTable = FseCompressionTable::new(
    &MATCH_LENGTH_DEFAULT_DISTRIBUTION,
    MAX_MATCH_LENGTH_SYMBOL,
    MATCH_LENGTH_DEFAULT_LOG,
);
static OFFSET_DEFAULT_TABLE: FseCompressionTable =
    FseCompressionTable::new(&OFFSET_DEFAULT_DISTRIBUTION, DEFAULT_MAX_OFFSET_CODE_SYMBOL, OFFSET_DEFAULT_LOG);
static RLE_TABLE: FseCompressionTable = FseCompressionTable::new_rle();

/// Room for the normalized counts of the widest code stream.
const MAX_CODE_SYMBOL_COUNT: usize = MAX_MATCH_LENGTH_SYMBOL + 1;

/// Upper bound of an FSE table header for any code stream.
const MAX_TABLE_HEADER_SIZE: usize = 512;

/// Fixed description of one code stream.
struct CodeKind {
    max_symbol: usize,
    max_table_log: u32,
    default_distribution: &'static [i16],
    default_log: u32,
    default_table: &'static FseCompressionTable,
}

const LITERAL_LENGTHS: CodeKind = CodeKind {
    max_symbol: MAX_LITERAL_LENGTH_SYMBOL,
    max_table_log: LITERAL_LENGTH_TABLE_LOG,
    default_distribution: &LITERAL_LENGTH_DEFAULT_DISTRIBUTION,
    default_log: LITERAL_LENGTH_DEFAULT_LOG,
    default_table: &LITERAL_LENGTH_DEFAULT_TABLE,
};

const OFFSETS: CodeKind = CodeKind {
    max_symbol: MAX_OFFSET_CODE_SYMBOL,
    max_table_log: OFFSET_TABLE_LOG,
    default_distribution: &OFFSET_DEFAULT_DISTRIBUTION,
    default_log: OFFSET_DEFAULT_LOG,
    default_table: &OFFSET_DEFAULT_TABLE,
};

const MATCH_LENGTHS: CodeKind = CodeKind {
    max_symbol: MAX_MATCH_LENGTH_SYMBOL,
    max_table_log: MATCH_LENGTH_TABLE_LOG,
    default_distribution: &MATCH_LENGTH_DEFAULT_DISTRIBUTION,
    default_log: MATCH_LENGTH_DEFAULT_LOG,
    default_table: &MATCH_LENGTH_DEFAULT_TABLE,
};

/// An FSE table built from block statistics, with the distribution it
/// came from.
#[derive(Debug, Clone)]
struct CodeTable {
    table: FseCompressionTable,
    normalized: [i16; MAX_CODE_SYMBOL_COUNT],
    max_symbol: usize,
    table_log: u32,
}

impl CodeTable {
    fn new() -> Box<Self> {
        Box::new(Self {
            table: FseCompressionTable::new_rle(),
            normalized: [0; MAX_CODE_SYMBOL_COUNT],
            max_symbol: 0,
            table_log: 0,
        })
    }
}

/// Table a stream of the current block is encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selected {
    Default,
    Rle,
    Previous,
    Candidate,
}

/// Per-stream table state carried across the blocks of one frame.
#[derive(Debug, Clone)]
struct CodeStream {
    /// Table the decoder holds from the last compressed block, if it was
    /// one we built.
    previous: Option<Box<CodeTable>>,
    candidate: Box<CodeTable>,
    /// Mode chosen for the block being encoded.
    selected: Selected,
}

impl CodeStream {
    fn new() -> Self {
        Self {
            previous: None,
            candidate: CodeTable::new(),
            selected: Selected::Default,
        }
    }

    fn table(&self, kind: &CodeKind) -> &FseCompressionTable {
        match self.selected {
            Selected::Default => kind.default_table,
            Selected::Rle => &RLE_TABLE,
            Selected::Candidate => &self.candidate.table,
            // Only selected while a previous table exists
            Selected::Previous => self.previous.as_ref().map_or(&RLE_TABLE, |previous| &previous.table),
        }
    }

    fn commit(&mut self) {
        match self.selected {
            Selected::Previous => {}
            Selected::Candidate => {
                let next = core::mem::replace(&mut self.candidate, self.previous.take().unwrap_or_else(CodeTable::new));
                self.previous = Some(next);
            }
            Selected::Default | Selected::Rle => self.previous = None,
        }
    }

    /// Pick a mode for `codes` and write its table description at the
    /// start of `output`. Returns the mode and the bytes written.
    fn prepare(
        &mut self,
        kind: &CodeKind,
        output: &mut [u8],
        codes: &[u8],
        counts: &mut [u32; 256],
        strategy: Strategy,
    ) -> Result<(SymbolEncodingType, usize)> {
        let count = codes.len();
        histogram::count(codes, counts);
        let max_symbol = histogram::find_max_symbol(counts, kind.max_symbol);
        let largest = histogram::find_largest_count(counts, max_symbol) as usize;
        let default_allowed = max_symbol < kind.default_distribution.len();

        if largest == count {
            if default_allowed && count <= 2 {
                self.selected = Selected::Default;
                return Ok((SymbolEncodingType::Predefined, 0));
            }
            if output.is_empty() {
                return Err(Error::buffer_too_small(1, 0));
            }
            output[0] = codes[0];
            self.selected = Selected::Rle;
            return Ok((SymbolEncodingType::Rle, 1));
        }

        if strategy < Strategy::Lazy {
            if default_allowed {
                let factor = 10 - strategy.ordinal() as usize;
                let min_sequences = ((1usize << kind.default_log) * factor) >> 3;
                if count < min_sequences || largest < count >> (kind.default_log - 1) {
                    self.selected = Selected::Default;
                    return Ok((SymbolEncodingType::Predefined, 0));
                }
            }
            let size = self.build_candidate(kind, output, codes, counts, max_symbol)?;
            self.selected = Selected::Candidate;
            return Ok((SymbolEncodingType::Compressed, size));
        }

        // Compare what each mode would cost, in bits
        let basic_cost = if default_allowed {
            cross_entropy_bits(counts, max_symbol, kind.default_distribution, kind.default_log)
        } else {
            None
        };
        let repeat_cost = self.previous.as_ref().and_then(|previous| {
            if max_symbol > previous.max_symbol {
                return None;
            }
            cross_entropy_bits(counts, max_symbol, &previous.normalized, previous.table_log)
        });

        let mut scratch = [0u8; MAX_TABLE_HEADER_SIZE];
        let header_size = self.build_candidate(kind, &mut scratch, codes, counts, max_symbol)?;
        let compressed_cost = (header_size as u64) * 8 + entropy_bits(counts, max_symbol, count);

        let basic = basic_cost.unwrap_or(u64::MAX);
        let repeat = repeat_cost.unwrap_or(u64::MAX);
        if basic <= repeat && basic <= compressed_cost {
            self.selected = Selected::Default;
            Ok((SymbolEncodingType::Predefined, 0))
        } else if repeat <= compressed_cost {
            self.selected = Selected::Previous;
            Ok((SymbolEncodingType::Repeat, 0))
        } else {
            if output.len() < header_size {
                return Err(Error::buffer_too_small(header_size, output.len()));
            }
            output[..header_size].copy_from_slice(&scratch[..header_size]);
            self.selected = Selected::Candidate;
            Ok((SymbolEncodingType::Compressed, header_size))
        }
    }

    /// Normalize the block statistics into a new table and write its
    /// header. Returns the header size.
    fn build_candidate(
        &mut self,
        kind: &CodeKind,
        output: &mut [u8],
        codes: &[u8],
        counts: &mut [u32; 256],
        max_symbol: usize,
    ) -> Result<usize> {
        let mut total = codes.len();
        let table_log = optimal_table_log(kind.max_table_log, total, max_symbol)?;

        // The last code only seeds the initial state
        let last = codes[total - 1] as usize;
        let mut adjusted = *counts;
        if adjusted[last] > 1 {
            adjusted[last] -= 1;
            total -= 1;
        }

        let candidate = &mut self.candidate;
        candidate.normalized.fill(0);
        normalize_counts(&mut candidate.normalized, table_log, &adjusted, total, max_symbol)?;
        candidate.table = FseCompressionTable::new(&candidate.normalized, max_symbol, table_log);
        candidate.max_symbol = max_symbol;
        candidate.table_log = table_log;

        write_normalized_counts(output, &candidate.normalized, max_symbol, table_log)
    }
}

/// Bits needed to code `counts` with a table built from `normalized`, or
/// `None` when a present symbol has no probability there.
fn cross_entropy_bits(counts: &[u32], max_symbol: usize, normalized: &[i16], table_log: u32) -> Option<u64> {
    let mut bits = 0.0f64;
    for (symbol, &count) in counts[..=max_symbol].iter().enumerate() {
        if count == 0 {
            continue;
        }
        let probability = match normalized.get(symbol).copied() {
            None | Some(0) => return None,
            Some(-1) => 1,
            Some(value) => value,
        };
        bits += count as f64 * (table_log as f64 - (probability as f64).log2());
    }
    Some(bits.ceil() as u64)
}

/// Shannon entropy of `counts` in bits.
fn entropy_bits(counts: &[u32], max_symbol: usize, total: usize) -> u64 {
    let total = total as f64;
    let bits: f64 = counts[..=max_symbol]
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| count as f64 * (total / count as f64).log2())
        .sum();
    bits.ceil() as u64
}

/// Sequence table state carried across the blocks of one frame.
#[derive(Debug, Clone)]
pub struct SequenceEncoder {
    literal_lengths: CodeStream,
    offsets: CodeStream,
    match_lengths: CodeStream,
    counts: [u32; 256],
}

impl Default for SequenceEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceEncoder {
    pub fn new() -> Self {
        Self {
            literal_lengths: CodeStream::new(),
            offsets: CodeStream::new(),
            match_lengths: CodeStream::new(),
            counts: [0; 256],
        }
    }

    /// Make the tables of the last encoded section the ones later blocks
    /// may repeat. Called once the block is emitted compressed.
    pub fn commit(&mut self) {
        self.literal_lengths.commit();
        self.offsets.commit();
        self.match_lengths.commit();
    }

    /// Encode the sequences of `store` (codes generated) into `output`;
    /// returns the section size.
    pub fn encode(&mut self, output: &mut [u8], store: &SequenceStore, strategy: Strategy) -> Result<usize> {
        let count = store.len();
        let mut position = write_sequence_count(output, count)?;
        if count == 0 {
            // Nothing to select; later blocks see the tables unchanged
            self.literal_lengths.selected = Selected::Previous;
            self.offsets.selected = Selected::Previous;
            self.match_lengths.selected = Selected::Previous;
            return Ok(position);
        }

        let mode_position = position;
        if output.len() <= mode_position {
            return Err(Error::buffer_too_small(mode_position + 1, output.len()));
        }
        position += 1;

        let (literal_length_mode, size) = self.literal_lengths.prepare(
            &LITERAL_LENGTHS,
            &mut output[position..],
            &store.literal_length_codes,
            &mut self.counts,
            strategy,
        )?;
        position += size;

        let (offset_mode, size) = self.offsets.prepare(
            &OFFSETS,
            &mut output[position..],
            &store.offset_codes,
            &mut self.counts,
            strategy,
        )?;
        position += size;

        let (match_length_mode, size) = self.match_lengths.prepare(
            &MATCH_LENGTHS,
            &mut output[position..],
            &store.match_length_codes,
            &mut self.counts,
            strategy,
        )?;
        position += size;

        output[mode_position] =
            (literal_length_mode as u8) << 6 | (offset_mode as u8) << 4 | (match_length_mode as u8) << 2;

        trace!(count, ?literal_length_mode, ?offset_mode, ?match_length_mode, "Sequence modes");

        position += encode_sequences(
            &mut output[position..],
            store,
            self.literal_lengths.table(&LITERAL_LENGTHS),
            self.offsets.table(&OFFSETS),
            self.match_lengths.table(&MATCH_LENGTHS),
        )?;

        Ok(position)
    }
}

/// Write the sequence count header; returns its size.
fn write_sequence_count(output: &mut [u8], count: usize) -> Result<usize> {
    let size = if count < 0x7F {
        1
    } else if count < LONG_NUMBER_OF_SEQUENCES {
        2
    } else {
        3
    };
    if output.len() < size {
        return Err(Error::buffer_too_small(size, output.len()));
    }

    match size {
        1 => output[0] = count as u8,
        2 => {
            output[0] = (count >> 8) as u8 | 0x80;
            output[1] = count as u8;
        }
        _ => {
            output[0] = 0xFF;
            write_u16_le(output, 1, (count - LONG_NUMBER_OF_SEQUENCES) as u16);
        }
    }
    Ok(size)
}

/// Write the sequences bitstream, last sequence first.
fn encode_sequences(
    output: &mut [u8],
    store: &SequenceStore,
    literal_length_table: &FseCompressionTable,
    offset_table: &FseCompressionTable,
    match_length_table: &FseCompressionTable,
) -> Result<usize> {
    let mut writer = BitWriter::new(output)?;
    let last = store.len() - 1;

    let literal_length_code = store.literal_length_codes[last];
    let offset_code = store.offset_codes[last];
    let match_length_code = store.match_length_codes[last];

    let mut match_length_state = match_length_table.begin(match_length_code);
    let mut offset_state = offset_table.begin(offset_code);
    let mut literal_length_state = literal_length_table.begin(literal_length_code);

    writer.add_bits(
        store.literal_lengths[last] as u64,
        LITERAL_LENGTH_BITS[literal_length_code as usize] as u32,
    );
    writer.add_bits(
        store.match_lengths[last] as u64,
        MATCH_LENGTH_BITS[match_length_code as usize] as u32,
    );
    writer.add_bits(store.offsets[last] as u64, offset_code as u32);
    writer.flush();

    // Keeps the states of all three tables plus a flushed remainder below
    // 64 bits
    let state_budget = 64 - 7 - (LITERAL_LENGTH_TABLE_LOG + MATCH_LENGTH_TABLE_LOG + OFFSET_TABLE_LOG);

    for n in (0..last).rev() {
        let literal_length_code = store.literal_length_codes[n];
        let offset_code = store.offset_codes[n];
        let match_length_code = store.match_length_codes[n];

        let literal_length_bits = LITERAL_LENGTH_BITS[literal_length_code as usize] as u32;
        let offset_bits = offset_code as u32;
        let match_length_bits = MATCH_LENGTH_BITS[match_length_code as usize] as u32;

        offset_state = offset_table.encode(&mut writer, offset_state, offset_code);
        match_length_state = match_length_table.encode(&mut writer, match_length_state, match_length_code);
        literal_length_state = literal_length_table.encode(&mut writer, literal_length_state, literal_length_code);

        if offset_bits + match_length_bits + literal_length_bits >= state_budget {
            writer.flush();
        }

        writer.add_bits(store.literal_lengths[n] as u64, literal_length_bits);
        if literal_length_bits + match_length_bits > 24 {
            writer.flush();
        }

        writer.add_bits(store.match_lengths[n] as u64, match_length_bits);
        if offset_bits + match_length_bits + literal_length_bits > 56 {
            writer.flush();
        }

        writer.add_bits(store.offsets[n] as u64, offset_bits);
        writer.flush();
    }

    match_length_table.finish(&mut writer, match_length_state);
    offset_table.finish(&mut writer, offset_state);
    literal_length_table.finish(&mut writer, literal_length_state);

    writer.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{SequenceDecoder, MIN_MATCH};
    use crate::compress::store::REP_MOVE;

    /// Sequences that rebuild `expected` from scratch: literals then a
    /// backwards match, repeatedly.
    fn sample_store(seed: u32, sequences: usize) -> (SequenceStore, Vec<u8>) {
        let mut store = SequenceStore::new();
        let mut output = Vec::new();
        let mut state = seed;
        let mut next = move |bound: u32| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (state >> 8) % bound
        };

        for _ in 0..sequences {
            let literal_count = (next(6) + 1) as usize;
            let literals: Vec<u8> = (0..literal_count).map(|_| b'a' + next(4) as u8).collect();
            output.extend_from_slice(&literals);

            let offset = (next(output.len() as u32) + 1) as usize;
            let match_length = (next(20) + MIN_MATCH as u32) as usize;
            for _ in 0..match_length {
                output.push(output[output.len() - offset]);
            }
            store.store_sequence(&literals, offset as u32 + REP_MOVE, (match_length - MIN_MATCH) as u32);
        }
        store.append_literals(b"end");
        output.extend_from_slice(b"end");
        store.generate_codes();
        (store, output)
    }

    fn decode(section: &[u8], store: &SequenceStore, decoder: &mut SequenceDecoder, expected: &[u8]) {
        let mut output = vec![0u8; expected.len()];
        let end = decoder.decode(section, &store.literals, &mut output, 0, 0).unwrap();
        assert_eq!(end, expected.len());
        assert_eq!(output, expected);
    }

    #[test]
    fn test_sequence_count_forms() {
        let mut buf = [0u8; 3];
        assert_eq!(write_sequence_count(&mut buf, 0x7E).unwrap(), 1);
        assert_eq!(buf[0], 0x7E);
        assert_eq!(write_sequence_count(&mut buf, 0x7F).unwrap(), 2);
        assert_eq!(buf[..2], [0x80, 0x7F]);
        assert_eq!(write_sequence_count(&mut buf, 0x7F00 + 5).unwrap(), 3);
        assert_eq!(buf, [0xFF, 5, 0]);
    }

    #[test]
    fn test_empty_section() {
        let mut encoder = SequenceEncoder::new();
        let mut output = [0u8; 8];
        let mut store = SequenceStore::new();
        store.generate_codes();
        assert_eq!(encoder.encode(&mut output, &store, Strategy::DFast).unwrap(), 1);
        assert_eq!(output[0], 0);
    }

    #[test]
    fn test_few_sequences_use_predefined_tables() {
        let (store, expected) = sample_store(1, 10);
        let mut encoder = SequenceEncoder::new();
        let mut output = vec![0u8; 1024];
        let size = encoder.encode(&mut output, &store, Strategy::DFast).unwrap();
        assert_eq!(output[1], 0, "all predefined");
        decode(&output[..size], &store, &mut SequenceDecoder::new(), &expected);
    }

    #[test]
    fn test_many_sequences_build_tables() {
        let (store, expected) = sample_store(2, 2000);
        let mut encoder = SequenceEncoder::new();
        let mut output = vec![0u8; 64 * 1024];
        let size = encoder.encode(&mut output, &store, Strategy::DFast).unwrap();
        assert_eq!(output[2] >> 6, SymbolEncodingType::Compressed as u8);
        decode(&output[..size], &store, &mut SequenceDecoder::new(), &expected);
    }

    #[test]
    fn test_rle_streams() {
        let mut store = SequenceStore::new();
        let mut expected = Vec::new();
        for _ in 0..50 {
            store.store_sequence(b"ab", 2 + REP_MOVE, 1);
            expected.extend_from_slice(b"ababab");
        }
        store.generate_codes();
        let mut encoder = SequenceEncoder::new();
        let mut output = vec![0u8; 1024];
        let size = encoder.encode(&mut output, &store, Strategy::DFast).unwrap();
        let rle = SymbolEncodingType::Rle as u8;
        assert_eq!(output[1], rle << 6 | rle << 4 | rle << 2);
        decode(&output[..size], &store, &mut SequenceDecoder::new(), &expected);
    }

    #[test]
    fn test_strong_strategy_repeats_committed_tables() {
        let (store, expected) = sample_store(3, 3000);
        let mut encoder = SequenceEncoder::new();
        let mut decoder = SequenceDecoder::new();
        let mut output = vec![0u8; 64 * 1024];

        let size = encoder.encode(&mut output, &store, Strategy::BtOpt).unwrap();
        decode(&output[..size], &store, &mut decoder, &expected);
        encoder.commit();

        // Same statistics again: repeating beats sending a table
        let size = encoder.encode(&mut output, &store, Strategy::BtOpt).unwrap();
        let mode_position = size_of_count(store.len());
        assert_eq!(output[mode_position] >> 6, SymbolEncodingType::Repeat as u8);
        decode(&output[..size], &store, &mut decoder, &expected);
    }

    #[test]
    fn test_uncommitted_tables_not_repeated() {
        let (store, _) = sample_store(4, 3000);
        let mut encoder = SequenceEncoder::new();
        let mut output = vec![0u8; 64 * 1024];
        encoder.encode(&mut output, &store, Strategy::BtOpt).unwrap();
        encoder.encode(&mut output, &store, Strategy::BtOpt).unwrap();
        let mode = output[size_of_count(store.len())];
        for shift in [6, 4, 2] {
            assert_ne!((mode >> shift) & 3, SymbolEncodingType::Repeat as u8);
        }
    }

    #[test]
    fn test_output_too_small() {
        let (store, _) = sample_store(5, 500);
        let mut encoder = SequenceEncoder::new();
        let mut output = vec![0u8; 40];
        assert!(encoder.encode(&mut output, &store, Strategy::DFast).is_err());
    }

    #[test]
    fn test_cost_estimates() {
        let counts = [30u32, 10, 0, 0];
        let uniform = [8i16, 8, 8, 8];
        // Every symbol costs log2(32 / 8) = 2 bits
        assert_eq!(cross_entropy_bits(&counts, 1, &uniform, 5), Some(80));
        assert_eq!(cross_entropy_bits(&counts, 1, &[16, 0], 5), None);
        assert_eq!(entropy_bits(&[1, 1, 0], 1, 2), 2);
    }

    fn size_of_count(count: usize) -> usize {
        1 + usize::from(count >= 0x7F) + usize::from(count >= LONG_NUMBER_OF_SEQUENCES)
    }
}
