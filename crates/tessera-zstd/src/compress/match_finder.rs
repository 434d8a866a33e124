//! Double-fast match finder.
//!
//! Two hash tables index positions of the frame input: a long table keyed
//! by 8 bytes and a short table keyed by the minimum match length (4 to 8
//! bytes). For each position the finder tries, in order:
//!
//! 1. the most recent offset, one byte ahead
//! 2. a long match
//! 3. a short match, upgraded to a long match one byte ahead when possible
//!
//! Without a match it skips ahead by `(distance since last match >> 8) + 1`
//! so incompressible data stays cheap. Tables store positions relative to
//! the start of the frame input, so they stay valid across blocks.

use super::parameters::CompressionParameters;
use super::store::{SequenceStore, REP_MOVE};
use crate::bits::{read_u32_le, read_u64_le};
use crate::block::MIN_MATCH;

const SEARCH_STRENGTH: u32 = 8;

const PRIME_4_BYTES: u32 = 0x9E37_79B1;
const PRIME_5_BYTES: u64 = 0xCF_1BBC_DCBB;
const PRIME_6_BYTES: u64 = 0xCF1B_BCDC_BF9B;
const PRIME_7_BYTES: u64 = 0xCF_1BBC_DCBF_A563;
const PRIME_8_BYTES: u64 = 0xCF1B_BCDC_B7A5_6463;

/// Match finder tables that persist across the blocks of one frame.
#[derive(Debug, Clone)]
pub struct BlockCompressionState {
    long_table: Vec<u32>,
    short_table: Vec<u32>,
    /// Positions at or below this one are outside the window.
    window_base: usize,
}

impl BlockCompressionState {
    pub fn new(parameters: &CompressionParameters) -> Self {
        Self {
            long_table: vec![0; 1 << parameters.hash_log],
            short_table: vec![0; 1 << parameters.chain_log],
            window_base: 0,
        }
    }

    /// Slide the window so no match ending before `input_limit` reaches
    /// further back than `max_distance`.
    pub fn enforce_max_distance(&mut self, input_limit: usize, max_distance: usize) {
        let new_base = input_limit.saturating_sub(max_distance);
        if self.window_base < new_base {
            self.window_base = new_base;
        }
    }

    pub fn window_base(&self) -> usize {
        self.window_base
    }
}

/// The two most recent offsets, as the encoder tracks them.
///
/// Values saved by a block take effect only on [`commit`](Self::commit),
/// which happens once the block is emitted compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetHistory {
    first: u32,
    second: u32,
    saved_first: u32,
    saved_second: u32,
}

impl Default for OffsetHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl OffsetHistory {
    pub fn new() -> Self {
        Self {
            first: 1,
            second: 4,
            saved_first: 1,
            saved_second: 4,
        }
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn second(&self) -> u32 {
        self.second
    }

    pub fn save(&mut self, first: u32, second: u32) {
        self.saved_first = first;
        self.saved_second = second;
    }

    pub fn commit(&mut self) {
        self.first = self.saved_first;
        self.second = self.saved_second;
    }
}

/// Find the matches of `input[start..end]` and record them in `store`.
///
/// `input` is the whole frame input so matches can reach into earlier
/// blocks. Returns the number of trailing bytes left as literals.
pub fn compress_block(
    input: &[u8],
    start: usize,
    end: usize,
    store: &mut SequenceStore,
    state: &mut BlockCompressionState,
    offsets: &mut OffsetHistory,
    parameters: &CompressionParameters,
) -> usize {
    let search_length = parameters.search_length.clamp(4, 8);
    let long_bits = parameters.hash_log;
    let short_bits = parameters.chain_log;
    let window_base = state.window_base;
    let long_table = &mut state.long_table;
    let short_table = &mut state.short_table;

    // Hashes read 8 bytes
    let limit = end.saturating_sub(8);

    let mut position = start;
    let mut anchor = start;
    let mut offset1 = offsets.first() as usize;
    let mut offset2 = offsets.second() as usize;
    let mut saved_offset = 0;

    if position == window_base {
        position += 1;
    }
    let max_repeat = position - window_base;
    if offset2 > max_repeat {
        saved_offset = offset2;
        offset2 = 0;
    }
    if offset1 > max_repeat {
        saved_offset = offset1;
        offset1 = 0;
    }

    while position < limit {
        let short_hash = hash(input, position, short_bits, search_length);
        let short_match = short_table[short_hash] as usize;
        let long_hash = hash8(read_u64_le(input, position), long_bits);
        let long_match = long_table[long_hash] as usize;

        let current = position;
        long_table[long_hash] = current as u32;
        short_table[short_hash] = current as u32;

        let match_length;

        if offset1 > 0 && read_u32_le(input, position + 1 - offset1) == read_u32_le(input, position + 1) {
            match_length = count(input, position + 1 + 4, end, position + 1 + 4 - offset1) + 4;
            position += 1;
            store.store_sequence(&input[anchor..position], 0, (match_length - MIN_MATCH) as u32);
        } else {
            let offset;
            if long_match > window_base && read_u64_le(input, long_match) == read_u64_le(input, position) {
                let (extended, length) =
                    extend_backwards(input, position, long_match, anchor, window_base);
                offset = position - long_match;
                position = extended;
                match_length = length + count(input, current + 8, end, long_match + 8) + 8;
            } else if short_match > window_base
                && read_u32_le(input, short_match) == read_u32_le(input, position)
            {
                let next_hash = hash8(read_u64_le(input, position + 1), long_bits);
                let next_match = long_table[next_hash] as usize;
                long_table[next_hash] = (current + 1) as u32;

                if next_match > window_base
                    && read_u64_le(input, next_match) == read_u64_le(input, position + 1)
                {
                    position += 1;
                    let (extended, length) =
                        extend_backwards(input, position, next_match, anchor, window_base);
                    offset = position - next_match;
                    match_length = length + count(input, current + 1 + 8, end, next_match + 8) + 8;
                    position = extended;
                } else {
                    let (extended, length) =
                        extend_backwards(input, position, short_match, anchor, window_base);
                    offset = position - short_match;
                    match_length = length + count(input, current + 4, end, short_match + 4) + 4;
                    position = extended;
                }
            } else {
                position += ((position - anchor) >> SEARCH_STRENGTH) + 1;
                continue;
            }

            offset2 = offset1;
            offset1 = offset;

            store.store_sequence(
                &input[anchor..position],
                offset as u32 + REP_MOVE,
                (match_length - MIN_MATCH) as u32,
            );
        }

        position += match_length;
        anchor = position;

        if position <= limit {
            let filled = current + 2;
            long_table[hash8(read_u64_le(input, filled), long_bits)] = filled as u32;
            short_table[hash(input, filled, short_bits, search_length)] = filled as u32;

            let filled = position - 2;
            long_table[hash8(read_u64_le(input, filled), long_bits)] = filled as u32;
            short_table[hash(input, filled, short_bits, search_length)] = filled as u32;

            // Immediate repeats of the second offset
            while position <= limit
                && offset2 > 0
                && read_u32_le(input, position) == read_u32_le(input, position - offset2)
            {
                let repeat_length = count(input, position + 4, end, position + 4 - offset2) + 4;
                core::mem::swap(&mut offset1, &mut offset2);

                short_table[hash(input, position, short_bits, search_length)] = position as u32;
                long_table[hash8(read_u64_le(input, position), long_bits)] = position as u32;

                store.store_sequence(&[], 0, (repeat_length - MIN_MATCH) as u32);

                position += repeat_length;
                anchor = position;
            }
        }
    }

    let first = if offset1 != 0 { offset1 } else { saved_offset };
    let second = if offset2 != 0 { offset2 } else { saved_offset };
    offsets.save(first as u32, second as u32);

    end - anchor
}

/// Walk a match backwards over not yet emitted literals. Returns the new
/// match start and the number of bytes gained.
#[inline]
fn extend_backwards(
    input: &[u8],
    mut position: usize,
    mut candidate: usize,
    anchor: usize,
    window_base: usize,
) -> (usize, usize) {
    let mut gained = 0;
    while position > anchor && candidate > window_base && input[position - 1] == input[candidate - 1] {
        position -= 1;
        candidate -= 1;
        gained += 1;
    }
    (position, gained)
}

/// Length of the common prefix of `input[position..end]` and the bytes at
/// `candidate`, which lies before `position`.
fn count(input: &[u8], mut position: usize, end: usize, mut candidate: usize) -> usize {
    let start = position;

    while position + 8 <= end {
        let diff = read_u64_le(input, position) ^ read_u64_le(input, candidate);
        if diff != 0 {
            return position - start + (diff.trailing_zeros() >> 3) as usize;
        }
        position += 8;
        candidate += 8;
    }

    while position < end && input[position] == input[candidate] {
        position += 1;
        candidate += 1;
    }

    position - start
}

#[inline]
fn hash(input: &[u8], position: usize, bits: u32, search_length: u32) -> usize {
    match search_length {
        8 => hash8(read_u64_le(input, position), bits),
        7 => hash_bytes(read_u64_le(input, position), 7, PRIME_7_BYTES, bits),
        6 => hash_bytes(read_u64_le(input, position), 6, PRIME_6_BYTES, bits),
        5 => hash_bytes(read_u64_le(input, position), 5, PRIME_5_BYTES, bits),
        _ => hash4(read_u32_le(input, position), bits),
    }
}

#[inline]
fn hash4(value: u32, bits: u32) -> usize {
    (value.wrapping_mul(PRIME_4_BYTES) >> (32 - bits)) as usize
}

/// Hash the low `bytes` bytes of `value`.
#[inline]
fn hash_bytes(value: u64, bytes: u32, prime: u64, bits: u32) -> usize {
    ((value << (64 - 8 * bytes)).wrapping_mul(prime) >> (64 - bits)) as usize
}

#[inline]
fn hash8(value: u64, bits: u32) -> usize {
    (value.wrapping_mul(PRIME_8_BYTES) >> (64 - bits)) as usize
}
