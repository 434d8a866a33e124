//! Sequences section decoding and execution.
//!
//! Sequences are LZ77 commands `(literal_length, offset, match_length)`.
//! Their codes travel in three interleaved FSE streams, the extra bits of
//! each value in the same backward bitstream.
//!
//! ## Repeat Offsets
//!
//! Offset values 1-3 reference the three most recent offsets; with a
//! literal length of 0 they shift by one, and value 3 then means "most
//! recent offset minus one". The history starts at `[1, 4, 8]` in every
//! frame.
//!
//! ## Symbol Compression Modes
//!
//! Each of the three code streams picks its own table:
//! - Predefined: the default distribution
//! - RLE: a single code for every sequence
//! - FSE: a table described in the section
//! - Repeat: the table of the previous block

use tessera_core::{Error, Result};

use super::{
    DEFAULT_MAX_OFFSET_CODE_SYMBOL, LITERAL_LENGTH_BASE, LITERAL_LENGTH_BITS, LITERAL_LENGTH_TABLE_LOG,
    LONG_NUMBER_OF_SEQUENCES, MATCH_LENGTH_BASE, MATCH_LENGTH_BITS, MATCH_LENGTH_TABLE_LOG,
    MAX_LITERAL_LENGTH_SYMBOL, MAX_MATCH_LENGTH_SYMBOL, OFFSET_TABLE_LOG,
};
use crate::bits::{read_u16_le, BitReader};
use crate::fse::{
    FseTable, FseTableRef, DEFAULT_LITERAL_LENGTH_TABLE, DEFAULT_MATCH_LENGTH_TABLE, DEFAULT_OFFSET_CODE_TABLE,
};

/// Bits one sequence may consume before the container must be reloaded.
const RELOAD_THRESHOLD: u32 = 64 - 7 - (LITERAL_LENGTH_TABLE_LOG + MATCH_LENGTH_TABLE_LOG + OFFSET_TABLE_LOG);

/// Table selection for one code stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolEncodingType {
    Predefined = 0,
    Rle = 1,
    Compressed = 2,
    Repeat = 3,
}

impl SymbolEncodingType {
    pub fn from_field(field: u8) -> Self {
        match field & 0x3 {
            0 => Self::Predefined,
            1 => Self::Rle,
            2 => Self::Compressed,
            _ => Self::Repeat,
        }
    }
}

/// The three most recently used match offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatedOffsets([u32; 3]);

impl Default for RepeatedOffsets {
    fn default() -> Self {
        Self::new()
    }
}

impl RepeatedOffsets {
    pub const INITIAL: [u32; 3] = [1, 4, 8];

    pub fn new() -> Self {
        Self(Self::INITIAL)
    }

    pub fn get(&self) -> [u32; 3] {
        self.0
    }

    /// Turn a decoded offset value into a match offset, updating the
    /// history.
    ///
    /// `value` is the offset code base plus its extra bits: 1-3 are
    /// repeat references, larger values carry the offset plus 3.
    pub fn resolve(&mut self, value: u32, literal_length: usize) -> u32 {
        let history = &mut self.0;
        if value > 3 {
            let offset = value - 3;
            *history = [offset, history[0], history[1]];
            return offset;
        }

        let index = if literal_length == 0 { value } else { value - 1 };
        if index == 0 {
            return history[0];
        }

        let mut offset = if index == 3 {
            history[0].wrapping_sub(1)
        } else {
            history[index as usize]
        };
        if offset == 0 {
            offset = 1;
        }

        if index != 1 {
            history[2] = history[1];
        }
        history[1] = history[0];
        history[0] = offset;
        offset
    }
}

/// Which table a code stream currently decodes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentTable {
    Predefined,
    Decoded,
}

/// Decoding table slot for one code stream.
#[derive(Debug, Clone)]
struct SymbolDecoder {
    table: FseTable,
    predefined: FseTableRef<'static>,
    max_symbol: usize,
    max_table_log: u32,
    current: Option<CurrentTable>,
}

impl SymbolDecoder {
    fn new(predefined: FseTableRef<'static>, max_symbol: usize, max_table_log: u32) -> Self {
        Self {
            table: FseTable::with_capacity(max_table_log),
            predefined,
            max_symbol,
            max_table_log,
            current: None,
        }
    }

    /// Select the table for this block; returns the bytes consumed.
    fn select(&mut self, encoding: SymbolEncodingType, input: &[u8], name: &str) -> Result<usize> {
        match encoding {
            SymbolEncodingType::Rle => {
                let Some(&symbol) = input.first() else {
                    return Err(Error::corrupted("Not enough input bytes"));
                };
                if symbol as usize > self.max_symbol {
                    return Err(Error::corrupted(format!("{name} RLE code exceeds maximum")));
                }
                self.table.init_rle(symbol);
                self.current = Some(CurrentTable::Decoded);
                Ok(1)
            }
            SymbolEncodingType::Predefined => {
                self.current = Some(CurrentTable::Predefined);
                Ok(0)
            }
            SymbolEncodingType::Repeat => {
                if self.current.is_none() {
                    return Err(Error::corrupted(format!("Expected {name} table to be present")));
                }
                Ok(0)
            }
            SymbolEncodingType::Compressed => {
                let size = self.table.read(input, self.max_symbol, self.max_table_log)?;
                self.current = Some(CurrentTable::Decoded);
                Ok(size)
            }
        }
    }

    fn table(&self) -> Result<FseTableRef<'_>> {
        match self.current {
            Some(CurrentTable::Predefined) => Ok(self.predefined),
            Some(CurrentTable::Decoded) => Ok(self.table.as_table_ref()),
            None => Err(Error::corrupted("Sequence table not selected")),
        }
    }
}

/// Decodes sequences sections and executes them against the output.
///
/// Tables and repeat offsets carry over between the blocks of a frame;
/// [`reset`](Self::reset) starts a new frame.
#[derive(Debug, Clone)]
pub struct SequenceDecoder {
    literal_lengths: SymbolDecoder,
    offset_codes: SymbolDecoder,
    match_lengths: SymbolDecoder,
    offsets: RepeatedOffsets,
}

impl Default for SequenceDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceDecoder {
    pub fn new() -> Self {
        Self {
            literal_lengths: SymbolDecoder::new(
                DEFAULT_LITERAL_LENGTH_TABLE,
                MAX_LITERAL_LENGTH_SYMBOL,
                LITERAL_LENGTH_TABLE_LOG,
            ),
            offset_codes: SymbolDecoder::new(
                DEFAULT_OFFSET_CODE_TABLE,
                DEFAULT_MAX_OFFSET_CODE_SYMBOL,
                OFFSET_TABLE_LOG,
            ),
            match_lengths: SymbolDecoder::new(
                DEFAULT_MATCH_LENGTH_TABLE,
                MAX_MATCH_LENGTH_SYMBOL,
                MATCH_LENGTH_TABLE_LOG,
            ),
            offsets: RepeatedOffsets::new(),
        }
    }

    /// Forget tables and offsets from the previous frame.
    pub fn reset(&mut self) {
        self.literal_lengths.current = None;
        self.offset_codes.current = None;
        self.match_lengths.current = None;
        self.offsets = RepeatedOffsets::new();
    }

    pub fn offsets(&self) -> RepeatedOffsets {
        self.offsets
    }

    /// Decode the sequences section `input` and write the block into
    /// `output` starting at `position`.
    ///
    /// Matches may reach back to `frame_start` but not before it. Returns
    /// the output position after the block.
    pub fn decode(
        &mut self,
        input: &[u8],
        literals: &[u8],
        output: &mut [u8],
        frame_start: usize,
        position: usize,
    ) -> Result<usize> {
        let Some(&first) = input.first() else {
            return Err(Error::corrupted("Not enough input bytes"));
        };

        let mut cursor = 1;
        let mut count = first as usize;
        if count > 127 {
            if count == 255 {
                if input.len() < 3 {
                    return Err(Error::corrupted_at("Not enough input bytes", 1));
                }
                count = read_u16_le(input, 1) as usize + LONG_NUMBER_OF_SEQUENCES;
                cursor = 3;
            } else {
                let Some(&next) = input.get(1) else {
                    return Err(Error::corrupted_at("Not enough input bytes", 1));
                };
                count = ((count - 128) << 8) + next as usize;
                cursor = 2;
            }
        }

        let mut output_position = position;
        let mut literals_position = 0;

        if count > 0 {
            if cursor >= input.len() {
                return Err(Error::corrupted_at("Not enough input bytes", cursor));
            }

            let modes = input[cursor];
            cursor += 1;
            cursor += self.literal_lengths.select(
                SymbolEncodingType::from_field(modes >> 6),
                &input[cursor..],
                "literal length",
            )?;
            cursor += self.offset_codes.select(
                SymbolEncodingType::from_field(modes >> 4),
                &input[cursor..],
                "offset code",
            )?;
            cursor += self.match_lengths.select(
                SymbolEncodingType::from_field(modes >> 2),
                &input[cursor..],
                "match length",
            )?;
            if cursor >= input.len() {
                return Err(Error::corrupted_at("Not enough input bytes", cursor));
            }

            let tables = SequenceTables {
                literal_lengths: self.literal_lengths.table()?,
                offset_codes: self.offset_codes.table()?,
                match_lengths: self.match_lengths.table()?,
            };
            let mut reader = BitReader::new(&input[cursor..])?;
            let mut execution = Execution {
                literals,
                literals_position,
                output: &mut *output,
                output_position,
                frame_start,
            };
            tables.run(&mut reader, count, &mut self.offsets, &mut execution)?;

            if !reader.is_end_of_stream() {
                return Err(Error::corrupted("Sequence bitstream not fully consumed"));
            }
            literals_position = execution.literals_position;
            output_position = execution.output_position;
        }

        // Trailing literals
        let remaining = &literals[literals_position..];
        let end = output_position + remaining.len();
        if end > output.len() {
            return Err(Error::buffer_too_small(end, output.len()));
        }
        output[output_position..end].copy_from_slice(remaining);
        Ok(end)
    }
}

/// Tables selected for one block.
struct SequenceTables<'a> {
    literal_lengths: FseTableRef<'a>,
    offset_codes: FseTableRef<'a>,
    match_lengths: FseTableRef<'a>,
}

impl SequenceTables<'_> {
    fn run(
        &self,
        reader: &mut BitReader<'_>,
        count: usize,
        offsets: &mut RepeatedOffsets,
        execution: &mut Execution<'_>,
    ) -> Result<()> {
        let mut literal_length_state = reader.read_bits(self.literal_lengths.log2_size) as usize;
        let mut offset_state = reader.read_bits(self.offset_codes.log2_size) as usize;
        let mut match_length_state = reader.read_bits(self.match_lengths.log2_size) as usize;

        for remaining in (0..count).rev() {
            reader.refill();
            if reader.is_overflow() {
                return Err(Error::corrupted("Not all sequences were consumed"));
            }

            let literal_length_entry = self.literal_lengths.entry(literal_length_state);
            let offset_entry = self.offset_codes.entry(offset_state);
            let match_length_entry = self.match_lengths.entry(match_length_state);

            let literal_length_code = literal_length_entry.symbol as usize;
            let match_length_code = match_length_entry.symbol as usize;
            let offset_code = offset_entry.symbol as u32;

            let literal_length_bits = LITERAL_LENGTH_BITS[literal_length_code] as u32;
            let match_length_bits = MATCH_LENGTH_BITS[match_length_code] as u32;

            let offset_value = (1u32 << offset_code) + reader.read_bits(offset_code) as u32;
            let match_length = MATCH_LENGTH_BASE[match_length_code] as usize
                + reader.read_bits(match_length_bits) as usize;
            let literal_length = LITERAL_LENGTH_BASE[literal_length_code] as usize
                + reader.read_bits(literal_length_bits) as usize;

            let offset = offsets.resolve(offset_value, literal_length);

            if literal_length_bits + match_length_bits + offset_code > RELOAD_THRESHOLD {
                reader.refill();
            }

            // The last sequence has no successor state to read
            if remaining > 0 {
                literal_length_state = literal_length_entry.new_state as usize
                    + reader.read_bits(literal_length_entry.number_of_bits as u32) as usize;
                match_length_state = match_length_entry.new_state as usize
                    + reader.read_bits(match_length_entry.number_of_bits as u32) as usize;
                offset_state =
                    offset_entry.new_state as usize + reader.read_bits(offset_entry.number_of_bits as u32) as usize;
            }

            execution.execute(literal_length, offset as usize, match_length)?;
        }

        reader.refill();
        Ok(())
    }
}

/// Output cursor for executing sequences.
struct Execution<'a> {
    literals: &'a [u8],
    literals_position: usize,
    output: &'a mut [u8],
    output_position: usize,
    frame_start: usize,
}

impl Execution<'_> {
    fn execute(&mut self, literal_length: usize, offset: usize, match_length: usize) -> Result<()> {
        let literal_end = self.output_position + literal_length;
        let match_end = literal_end + match_length;
        if match_end > self.output.len() {
            return Err(Error::buffer_too_small(match_end, self.output.len()));
        }

        let literals_end = self.literals_position + literal_length;
        if literals_end > self.literals.len() {
            return Err(Error::corrupted("Input is corrupted: literal length exceeds literals"));
        }
        if offset > literal_end - self.frame_start {
            return Err(Error::corrupted(format!(
                "Input is corrupted: offset {offset} reaches before frame start"
            )));
        }

        self.output[self.output_position..literal_end]
            .copy_from_slice(&self.literals[self.literals_position..literals_end]);
        copy_match(self.output, literal_end, offset, match_length);

        self.literals_position = literals_end;
        self.output_position = match_end;
        Ok(())
    }
}

/// Copy `length` bytes from `offset` bytes back, allowing the source to
/// overlap the destination.
fn copy_match(output: &mut [u8], position: usize, offset: usize, length: usize) {
    let source = position - offset;
    if offset >= length {
        output.copy_within(source..source + length, position);
        return;
    }

    // Each chunk reads only bytes already written
    let mut copied = 0;
    while copied < length {
        let chunk = (length - copied).min(offset);
        output.copy_within(source + copied..source + copied + chunk, position + copied);
        copied += chunk;
    }
}
