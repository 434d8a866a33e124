//! Count normalization.
//!
//! Scales raw symbol counts so they sum to exactly `1 << table_log`.
//! Symbols that occur but would round to zero get the `-1` "low
//! probability" marker, which occupies one table cell.

use tessera_core::{Error, Result};

use super::{MAX_TABLE_LOG, MIN_TABLE_LOG};
use crate::bits::highest_bit;

/// Fractional remainders a small probability must exceed to be rounded up,
/// in units of `1 << (scale - 20)`.
const REST_TO_BEAT: [u64; 8] = [0, 473195, 504333, 520860, 550000, 700000, 750000, 830000];

const UNASSIGNED: i16 = -2;

/// Smallest table log able to represent `max_symbol + 1` symbols for an
/// input of `input_size` symbols.
pub fn min_table_log(input_size: usize, max_symbol: usize) -> u32 {
    debug_assert!(input_size > 1);
    let from_size = highest_bit((input_size - 1) as u32) + 1;
    let from_symbols = highest_bit(max_symbol.max(1) as u32) + 2;
    from_size.min(from_symbols)
}

/// Pick a table log for `input_size` symbols, no larger than
/// `max_table_log` and within [`MIN_TABLE_LOG`, `MAX_TABLE_LOG`].
pub fn optimal_table_log(max_table_log: u32, input_size: usize, max_symbol: usize) -> Result<u32> {
    if input_size <= 1 {
        return Err(Error::invalid_argument(
            "FSE needs at least two symbols; use RLE instead",
        ));
    }

    // Small inputs tolerate less accuracy
    let from_size = (highest_bit((input_size - 1) as u32) as i64 - 2).max(0) as u32;
    let mut result = max_table_log.min(from_size);
    result = result.max(min_table_log(input_size, max_symbol));
    Ok(result.clamp(MIN_TABLE_LOG, MAX_TABLE_LOG))
}

/// Normalize `counts[..=max_symbol]` (summing to `total`) into
/// `normalized`, which then sums to `1 << table_log` with `-1` entries
/// counting as one.
pub fn normalize_counts(
    normalized: &mut [i16],
    table_log: u32,
    counts: &[u32],
    total: usize,
    max_symbol: usize,
) -> Result<()> {
    if table_log < MIN_TABLE_LOG {
        return Err(Error::invalid_argument("Unsupported FSE table size"));
    }
    if table_log > MAX_TABLE_LOG {
        return Err(Error::invalid_argument("FSE table size too large"));
    }
    if table_log < min_table_log(total, max_symbol) {
        return Err(Error::invalid_argument("FSE table size too small"));
    }

    let scale = 62 - table_log;
    let step = (1u64 << 62) / total as u64;
    let vstep = 1u64 << (scale - 20);

    let mut still_to_distribute = 1i32 << table_log;
    let mut largest = 0usize;
    let mut largest_probability = 0i16;
    let low_threshold = (total >> table_log) as u32;

    for symbol in 0..=max_symbol {
        let count = counts[symbol];
        if count as usize == total {
            return Err(Error::invalid_argument(
                "single-symbol input must be RLE encoded",
            ));
        }
        if count == 0 {
            normalized[symbol] = 0;
            continue;
        }
        if count <= low_threshold {
            normalized[symbol] = -1;
            still_to_distribute -= 1;
        } else {
            let scaled = count as u64 * step;
            let mut probability = (scaled >> scale) as i16;
            if probability < 8 {
                let rest_to_beat = vstep * REST_TO_BEAT[probability as usize];
                let delta = scaled - ((probability as u64) << scale);
                if delta > rest_to_beat {
                    probability += 1;
                }
            }
            if probability > largest_probability {
                largest_probability = probability;
                largest = symbol;
            }
            normalized[symbol] = probability;
            still_to_distribute -= probability as i32;
        }
    }

    if -still_to_distribute >= (normalized[largest] >> 1) as i32 {
        // Correction too large for one symbol to absorb
        normalize_counts_spread(normalized, table_log, counts, total, max_symbol);
    } else {
        normalized[largest] += still_to_distribute as i16;
    }
    Ok(())
}

/// Fallback normalization: settle the small symbols first, then share
/// the remaining cells among the others with fixed-point interval scaling.
fn normalize_counts_spread(
    normalized: &mut [i16],
    table_log: u32,
    counts: &[u32],
    total: usize,
    max_symbol: usize,
) {
    let mut total = total as u64;
    let mut distributed = 0u64;

    let low_threshold = total >> table_log;
    let mut low_one = (total * 3) >> (table_log + 1);

    for i in 0..=max_symbol {
        let count = counts[i] as u64;
        if count == 0 {
            normalized[i] = 0;
        } else if count <= low_threshold {
            normalized[i] = -1;
            distributed += 1;
            total -= count;
        } else if count <= low_one {
            normalized[i] = 1;
            distributed += 1;
            total -= count;
        } else {
            normalized[i] = UNASSIGNED;
        }
    }

    let normalization_factor = 1u64 << table_log;
    let mut to_distribute = normalization_factor - distributed;

    if total / to_distribute > low_one {
        // Risk of rounding to zero
        low_one = (total * 3) / (to_distribute * 2);
        for i in 0..=max_symbol {
            if normalized[i] == UNASSIGNED && counts[i] as u64 <= low_one {
                normalized[i] = 1;
                distributed += 1;
                total -= counts[i] as u64;
            }
        }
        to_distribute = normalization_factor - distributed;
    }

    if distributed == max_symbol as u64 + 1 {
        // Every symbol is rare: hand the rest to the most frequent one
        let mut max_value = 0;
        let mut max_count = 0;
        for (i, &count) in counts[..=max_symbol].iter().enumerate() {
            if count > max_count {
                max_value = i;
                max_count = count;
            }
        }
        normalized[max_value] += to_distribute as i16;
        return;
    }

    if total == 0 {
        // Every symbol was settled above: round-robin over the positive ones
        let mut i = 0;
        while to_distribute > 0 {
            if normalized[i] > 0 {
                to_distribute -= 1;
                normalized[i] += 1;
            }
            i = (i + 1) % (max_symbol + 1);
        }
        return;
    }

    let v_step_log = 62 - table_log;
    let mid = (1u64 << (v_step_log - 1)) - 1;
    let r_step = ((1u64 << v_step_log) * to_distribute + mid) / total;
    let mut tmp_total = mid;
    for i in 0..=max_symbol {
        if normalized[i] == UNASSIGNED {
            let end = tmp_total + counts[i] as u64 * r_step;
            let start_cell = tmp_total >> v_step_log;
            let end_cell = end >> v_step_log;
            normalized[i] = (end_cell - start_cell) as i16;
            tmp_total = end;
        }
    }
}
