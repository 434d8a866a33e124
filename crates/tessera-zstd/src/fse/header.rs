//! FSE table description headers.
//!
//! ```text
//! [ table_log - 5 : 4 bits ][ probability fields ... ]
//! ```
//!
//! Each probability field stores `count + 1` in a width that shrinks as the
//! remaining mass drops. After a zero probability, 2-bit repeat flags give
//! the number of further zeros (3 means "3 more and another flag follows");
//! a run of 24 zeros is written as a single `0xFFFF` short.

use tessera_core::{Error, Result};

use super::{MAX_TABLE_LOG, MIN_TABLE_LOG};
use crate::bits::write_u16_le;

/// Serialize `normalized[..=max_symbol]` and return the header size.
pub fn write_normalized_counts(
    output: &mut [u8],
    normalized: &[i16],
    max_symbol: usize,
    table_log: u32,
) -> Result<usize> {
    if table_log > MAX_TABLE_LOG {
        return Err(Error::invalid_argument("FSE table too large"));
    }
    if table_log < MIN_TABLE_LOG {
        return Err(Error::invalid_argument("FSE table too small"));
    }

    let mut writer = ShortWriter { output, position: 0 };
    let table_size = 1i32 << table_log;

    let mut bit_stream = table_log - MIN_TABLE_LOG;
    let mut bit_count = 4u32;

    // One extra unit of accuracy
    let mut remaining = table_size + 1;
    let mut threshold = table_size;
    let mut table_bit_count = table_log + 1;

    let mut symbol = 0usize;
    let mut previous_is_zero = false;

    while remaining > 1 {
        if previous_is_zero {
            let mut start = symbol;
            while normalized[symbol] == 0 {
                symbol += 1;
            }

            while symbol >= start + 24 {
                start += 24;
                bit_stream |= 0xFFFF << bit_count;
                writer.put(bit_stream)?;
                // Written whole, so the bit count stays put
                bit_stream >>= 16;
            }

            while symbol >= start + 3 {
                start += 3;
                bit_stream |= 0x3 << bit_count;
                bit_count += 2;
            }

            bit_stream |= ((symbol - start) as u32) << bit_count;
            bit_count += 2;

            if bit_count > 16 {
                writer.put(bit_stream)?;
                bit_stream >>= 16;
                bit_count -= 16;
            }
        }

        let mut count = normalized[symbol] as i32;
        symbol += 1;
        let max = (2 * threshold - 1) - remaining;
        remaining -= count.abs();
        count += 1;
        if count >= threshold {
            count += max;
        }
        bit_stream |= (count as u32) << bit_count;
        bit_count += table_bit_count;
        if count < max {
            bit_count -= 1;
        }
        previous_is_zero = count == 1;

        if remaining < 1 {
            return Err(Error::invalid_argument(
                "normalized counts exceed the table size",
            ));
        }

        while remaining < threshold {
            table_bit_count -= 1;
            threshold >>= 1;
        }

        if bit_count > 16 {
            writer.put(bit_stream)?;
            bit_stream >>= 16;
            bit_count -= 16;
        }
    }

    writer.put(bit_stream)?;
    let size = writer.position - 2 + (bit_count as usize + 7) / 8;

    if symbol > max_symbol + 1 {
        return Err(Error::invalid_argument(
            "normalized counts run past the maximum symbol",
        ));
    }
    Ok(size)
}

/// Bounds-checked 16-bit little-endian emitter.
struct ShortWriter<'a> {
    output: &'a mut [u8],
    position: usize,
}

impl ShortWriter<'_> {
    fn put(&mut self, bits: u32) -> Result<()> {
        if self.position + 2 > self.output.len() {
            return Err(Error::buffer_too_small(self.position + 2, self.output.len()));
        }
        write_u16_le(self.output, self.position, bits as u16);
        self.position += 2;
        Ok(())
    }
}

/// A parsed table description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    /// Log2 of the table size.
    pub table_log: u32,
    /// Highest symbol with an entry.
    pub max_symbol: usize,
    /// Header size in bytes.
    pub size: usize,
}

/// Parse a table description from the start of `input` into `normalized`.
///
/// Symbols above `max_symbol` and table logs above `max_table_log` are
/// rejected. `input` must hold at least 4 bytes.
pub fn read_normalized_counts(
    input: &[u8],
    normalized: &mut [i16],
    max_symbol: usize,
    max_table_log: u32,
) -> Result<TableHeader> {
    if input.len() < 4 {
        return Err(Error::corrupted("Not enough input bytes"));
    }

    let mut bit_position = 0usize;
    let mut bit_stream = peek_u32(input, bit_position);
    let table_log = (bit_stream & 0xF) + MIN_TABLE_LOG;
    if table_log > max_table_log {
        return Err(Error::corrupted("FSE table size exceeds maximum allowed size"));
    }
    bit_position += 4;

    let mut remaining = (1i32 << table_log) + 1;
    let mut threshold = 1i32 << table_log;
    let mut number_of_bits = table_log + 1;
    let mut symbol = 0usize;
    let mut previous_is_zero = false;

    while remaining > 1 && symbol <= max_symbol {
        if previous_is_zero {
            let mut run_end = symbol;
            loop {
                bit_stream = peek_u32(input, bit_position);
                if bit_stream & 0xFFFF != 0xFFFF {
                    break;
                }
                run_end += 24;
                bit_position += 16;
            }
            while bit_stream & 3 == 3 {
                run_end += 3;
                bit_position += 2;
                bit_stream = peek_u32(input, bit_position);
            }
            run_end += (bit_stream & 3) as usize;
            bit_position += 2;
            if run_end > max_symbol {
                return Err(Error::corrupted("Symbol larger than max value"));
            }
            normalized[symbol..run_end].fill(0);
            symbol = run_end;
        }

        bit_stream = peek_u32(input, bit_position);
        let max = (2 * threshold - 1) - remaining;
        let low = (bit_stream & (threshold as u32 - 1)) as i32;
        let mut count = if low < max {
            bit_position += number_of_bits as usize - 1;
            low
        } else {
            let mut count = (bit_stream & (2 * threshold as u32 - 1)) as i32;
            if count >= threshold {
                count -= max;
            }
            bit_position += number_of_bits as usize;
            count
        };

        // Stored with one extra unit of accuracy
        count -= 1;
        remaining -= count.abs();
        normalized[symbol] = count as i16;
        symbol += 1;
        previous_is_zero = count == 0;

        while remaining < threshold {
            number_of_bits -= 1;
            threshold >>= 1;
        }
    }

    if remaining != 1 {
        return Err(Error::corrupted("Input is corrupted"));
    }
    if bit_position > input.len() * 8 {
        return Err(Error::corrupted("Input is corrupted"));
    }

    Ok(TableHeader {
        table_log,
        max_symbol: symbol - 1,
        size: (bit_position + 7) >> 3,
    })
}

/// Read 32 bits starting at an arbitrary bit position; bytes past the end
/// of `input` read as zero.
fn peek_u32(input: &[u8], bit_position: usize) -> u32 {
    let start = bit_position >> 3;
    let mut bytes = [0u8; 8];
    if start < input.len() {
        let end = input.len().min(start + 8);
        bytes[..end - start].copy_from_slice(&input[start..end]);
    }
    (u64::from_le_bytes(bytes) >> (bit_position & 7)) as u32
}
