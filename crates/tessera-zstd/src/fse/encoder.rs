//! FSE compression tables.
//!
//! The encoder walks states in the opposite direction of the decoder: for a
//! symbol and the current state it emits the low bits of the state and jumps
//! to the state whose decoding entry leads back here. Per symbol, the number
//! of emitted bits is `(state + delta_number_of_bits) >> 16`, and the next
//! state is found in `next_state` at `(state >> bits) + delta_find_state`.

use super::{spread_symbols, MAX_SYMBOL, MAX_TABLE_SIZE};
use crate::bits::{highest_bit, BitWriter};

/// Compression-side FSE table.
///
/// Fixed-capacity so the built-in tables can be computed at compile time.
#[derive(Debug, Clone)]
pub struct FseCompressionTable {
    log2_size: u32,
    next_state: [u16; MAX_TABLE_SIZE],
    delta_number_of_bits: [u32; MAX_SYMBOL + 1],
    delta_find_state: [i32; MAX_SYMBOL + 1],
}

impl FseCompressionTable {
    /// Build from a normalized distribution summing to `1 << table_log`.
    pub const fn new(normalized: &[i16], max_symbol: usize, table_log: u32) -> Self {
        let table_size = 1usize << table_log;
        let (symbols, position) = spread_symbols(normalized, max_symbol, table_log);
        debug_assert!(position == 0, "spread symbols failed");

        // Start of each symbol's run in next_state; low-probability symbols
        // hold a single state
        let mut cumulative = [0u32; MAX_SYMBOL + 2];
        let mut i = 1;
        while i <= max_symbol + 1 {
            let count = normalized[i - 1];
            cumulative[i] = cumulative[i - 1] + if count == -1 { 1 } else { count as u32 };
            i += 1;
        }
        cumulative[max_symbol + 1] = table_size as u32 + 1;

        let mut next_state = [0u16; MAX_TABLE_SIZE];
        let mut i = 0;
        while i < table_size {
            let symbol = symbols[i] as usize;
            next_state[cumulative[symbol] as usize] = (table_size + i) as u16;
            cumulative[symbol] += 1;
            i += 1;
        }

        let mut delta_number_of_bits = [0u32; MAX_SYMBOL + 1];
        let mut delta_find_state = [0i32; MAX_SYMBOL + 1];
        let mut total = 0i32;
        let mut symbol = 0;
        while symbol <= max_symbol {
            match normalized[symbol] {
                0 => {
                    delta_number_of_bits[symbol] = ((table_log + 1) << 16) - table_size as u32;
                }
                -1 | 1 => {
                    delta_number_of_bits[symbol] = (table_log << 16) - table_size as u32;
                    delta_find_state[symbol] = total - 1;
                    total += 1;
                }
                count => {
                    let count = count as u32;
                    let max_bits_out = table_log - highest_bit(count - 1);
                    let min_state_plus = count << max_bits_out;
                    delta_number_of_bits[symbol] = (max_bits_out << 16) - min_state_plus;
                    delta_find_state[symbol] = total - count as i32;
                    total += count as i32;
                }
            }
            symbol += 1;
        }

        Self {
            log2_size: table_log,
            next_state,
            delta_number_of_bits,
            delta_find_state,
        }
    }

    /// Table for a stream made of a single repeated symbol; encodes to no
    /// bits at all.
    pub const fn new_rle() -> Self {
        Self {
            log2_size: 0,
            next_state: [0u16; MAX_TABLE_SIZE],
            delta_number_of_bits: [0u32; MAX_SYMBOL + 1],
            delta_find_state: [0i32; MAX_SYMBOL + 1],
        }
    }

    /// Log2 of the table size.
    pub fn log2_size(&self) -> u32 {
        self.log2_size
    }

    /// Initial state for the last symbol of a stream.
    #[inline]
    pub fn begin(&self, symbol: u8) -> u32 {
        let delta = self.delta_number_of_bits[symbol as usize];
        let output_bits = (delta + (1 << 15)) >> 16;
        let base = ((output_bits << 16) - delta) >> output_bits;
        self.next_state[(base as i32 + self.delta_find_state[symbol as usize]) as usize] as u32
    }

    /// Emit the bits of `state` needed to encode `symbol`; returns the next state.
    #[inline]
    pub fn encode(&self, writer: &mut BitWriter<'_>, state: u32, symbol: u8) -> u32 {
        let output_bits = (state + self.delta_number_of_bits[symbol as usize]) >> 16;
        writer.add_bits(state as u64, output_bits);
        let index = (state >> output_bits) as i32 + self.delta_find_state[symbol as usize];
        self.next_state[index as usize] as u32
    }

    /// Emit the final state so the decoder can start from it.
    #[inline]
    pub fn finish(&self, writer: &mut BitWriter<'_>, state: u32) {
        writer.add_bits(state as u64, self.log2_size);
        writer.flush();
    }
}
