//! Sequences collected from one block, before entropy coding.

use crate::bits::highest_bit;
use crate::frame::MAX_BLOCK_SIZE;

/// Repeat offsets are coded 0-2; a new offset `o` is coded `o + REP_MOVE`.
pub const REP_MOVE: u32 = 2;

#[rustfmt::skip]
const LITERAL_LENGTH_CODE: [u8; 64] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
    16, 16, 17, 17, 18, 18, 19, 19, 20, 20, 20, 20, 21, 21, 21, 21,
    22, 22, 22, 22, 22, 22, 22, 22, 23, 23, 23, 23, 23, 23, 23, 23,
    24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24,
];

#[rustfmt::skip]
const MATCH_LENGTH_CODE: [u8; 128] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
    16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
    32, 32, 33, 33, 34, 34, 35, 35, 36, 36, 36, 36, 37, 37, 37, 37,
    38, 38, 38, 38, 38, 38, 38, 38, 39, 39, 39, 39, 39, 39, 39, 39,
    40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40,
    41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41,
    42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42,
    42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42,
];

/// Parallel arrays describing the sequences of one block, plus the
/// literal bytes they consume.
///
/// Match lengths are stored minus the minimum match. Offsets hold the
/// value whose code and extra bits go on the wire: 1-3 for repeat
/// offsets, `offset + 3` otherwise.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    pub literals: Vec<u8>,
    pub literal_lengths: Vec<u32>,
    pub match_lengths: Vec<u32>,
    pub offsets: Vec<u32>,
    pub literal_length_codes: Vec<u8>,
    pub match_length_codes: Vec<u8>,
    pub offset_codes: Vec<u8>,
}

impl Default for SequenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceStore {
    pub fn new() -> Self {
        // A block of n bytes holds at most n / MIN_MATCH sequences
        let capacity = MAX_BLOCK_SIZE / 3;
        Self {
            literals: Vec::with_capacity(MAX_BLOCK_SIZE),
            literal_lengths: Vec::with_capacity(capacity),
            match_lengths: Vec::with_capacity(capacity),
            offsets: Vec::with_capacity(capacity),
            literal_length_codes: Vec::with_capacity(capacity),
            match_length_codes: Vec::with_capacity(capacity),
            offset_codes: Vec::with_capacity(capacity),
        }
    }

    pub fn reset(&mut self) {
        self.literals.clear();
        self.literal_lengths.clear();
        self.match_lengths.clear();
        self.offsets.clear();
        self.literal_length_codes.clear();
        self.match_length_codes.clear();
        self.offset_codes.clear();
    }

    /// Number of sequences stored.
    pub fn len(&self) -> usize {
        self.literal_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literal_lengths.is_empty()
    }

    /// Record `literals` followed by a match.
    ///
    /// `offset_code` is 0 for the most recent offset and `offset +
    /// REP_MOVE` for a new one; `match_length_base` is the match length
    /// minus the minimum match.
    pub fn store_sequence(&mut self, literals: &[u8], offset_code: u32, match_length_base: u32) {
        self.literals.extend_from_slice(literals);
        self.literal_lengths.push(literals.len() as u32);
        self.offsets.push(offset_code + 1);
        self.match_lengths.push(match_length_base);
    }

    /// Append the literals left after the last match.
    pub fn append_literals(&mut self, literals: &[u8]) {
        self.literals.extend_from_slice(literals);
    }

    /// Derive the code of every stored length and offset.
    pub fn generate_codes(&mut self) {
        self.literal_length_codes.clear();
        self.literal_length_codes
            .extend(self.literal_lengths.iter().map(|&length| literal_length_code(length)));

        self.match_length_codes.clear();
        self.match_length_codes
            .extend(self.match_lengths.iter().map(|&length| match_length_code(length)));

        self.offset_codes.clear();
        self.offset_codes
            .extend(self.offsets.iter().map(|&offset| highest_bit(offset) as u8));
    }
}

/// Code of a literal length.
pub fn literal_length_code(length: u32) -> u8 {
    const DELTA: u32 = 19;
    if length < 64 {
        LITERAL_LENGTH_CODE[length as usize]
    } else {
        (highest_bit(length) + DELTA) as u8
    }
}

/// Code of a match length already reduced by the minimum match.
pub fn match_length_code(length_base: u32) -> u8 {
    const DELTA: u32 = 36;
    if length_base < 128 {
        MATCH_LENGTH_CODE[length_base as usize]
    } else {
        (highest_bit(length_base) + DELTA) as u8
    }
}
