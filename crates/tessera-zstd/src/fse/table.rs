//! FSE decoding tables.
//!
//! A decoding table maps a state to the symbol it emits, the number of bits
//! to read for the next state, and the base the read bits are added to.
//! Tables are built with the standard spread construction (RFC 8878
//! Section 4.1.1): symbol cells are placed `(size >> 1) + (size >> 3) + 3`
//! positions apart, low-probability symbols take the top cells.

use tessera_core::{Error, Result};

use super::header::read_normalized_counts;
use super::{spread_symbols, MAX_SYMBOL};
use crate::bits::highest_bit;

/// A single decoding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FseEntry {
    /// Base of the next state; the bits read are added to it.
    pub new_state: u16,
    /// Symbol emitted by this state.
    pub symbol: u8,
    /// Bits to read for the next state.
    pub number_of_bits: u8,
}

impl FseEntry {
    pub const fn new(new_state: u16, symbol: u8, number_of_bits: u8) -> Self {
        Self {
            new_state,
            symbol,
            number_of_bits,
        }
    }
}

/// Borrowed view of a decoding table.
///
/// Built-in tables are `'static` constants; tables read from a stream are
/// views of an [`FseTable`].
#[derive(Debug, Clone, Copy)]
pub struct FseTableRef<'a> {
    pub log2_size: u32,
    pub entries: &'a [FseEntry],
}

impl FseTableRef<'_> {
    /// Entry for `state`.
    #[inline]
    pub fn entry(&self, state: usize) -> FseEntry {
        self.entries[state]
    }
}

/// Owned decoding table, reused across blocks.
#[derive(Debug, Clone)]
pub struct FseTable {
    log2_size: u32,
    entries: Vec<FseEntry>,
}

impl FseTable {
    /// Allocate a table able to hold `1 << log2_capacity` states.
    pub fn with_capacity(log2_capacity: u32) -> Self {
        Self {
            log2_size: 0,
            entries: vec![FseEntry::default(); 1 << log2_capacity],
        }
    }

    /// Log2 of the current table size.
    pub fn log2_size(&self) -> u32 {
        self.log2_size
    }

    /// View of the current table.
    pub fn as_table_ref(&self) -> FseTableRef<'_> {
        FseTableRef {
            log2_size: self.log2_size,
            entries: &self.entries[..1 << self.log2_size],
        }
    }

    /// Parse a table description from `input` and build the table.
    /// Returns the number of header bytes consumed.
    pub fn read(&mut self, input: &[u8], max_symbol: usize, max_table_log: u32) -> Result<usize> {
        let mut normalized = [0i16; MAX_SYMBOL + 1];
        let header = read_normalized_counts(input, &mut normalized, max_symbol, max_table_log)?;
        self.build(&normalized, header.max_symbol, header.table_log)?;
        Ok(header.size)
    }

    /// Build from a normalized distribution summing to `1 << table_log`.
    pub fn build(&mut self, normalized: &[i16], max_symbol: usize, table_log: u32) -> Result<()> {
        let table_size = 1usize << table_log;
        if table_size > self.entries.len() {
            return Err(Error::corrupted("FSE table too large for this stream"));
        }

        let (symbols, position) = spread_symbols(normalized, max_symbol, table_log);
        // Every cell visited exactly once brings the walk back to zero
        if position != 0 {
            return Err(Error::corrupted("Input is corrupted"));
        }

        let mut next_symbol = [0u16; MAX_SYMBOL + 1];
        for (symbol, &count) in normalized[..=max_symbol].iter().enumerate() {
            next_symbol[symbol] = if count == -1 { 1 } else { count.max(0) as u16 };
        }

        for (entry, &symbol) in self.entries[..table_size].iter_mut().zip(symbols.iter()) {
            let next_state = next_symbol[symbol as usize] as u32;
            next_symbol[symbol as usize] += 1;
            let number_of_bits = table_log - highest_bit(next_state);
            *entry = FseEntry::new(
                ((next_state << number_of_bits) as usize - table_size) as u16,
                symbol,
                number_of_bits as u8,
            );
        }

        self.log2_size = table_log;
        Ok(())
    }

    /// Single-state table that always emits `symbol` and reads no bits.
    pub fn init_rle(&mut self, symbol: u8) {
        self.log2_size = 0;
        self.entries[0] = FseEntry::new(0, symbol, 0);
    }
}

// =============================================================================
// Built-in sequence tables
// =============================================================================
//
// Decoding tables for the default distributions, used by the "predefined"
// symbol compression mode.

const fn zip_entries<const N: usize>(
    new_state: [u16; N],
    symbol: [u8; N],
    number_of_bits: [u8; N],
) -> [FseEntry; N] {
    let mut entries = [FseEntry::new(0, 0, 0); N];
    let mut i = 0;
    while i < N {
        entries[i] = FseEntry::new(new_state[i], symbol[i], number_of_bits[i]);
        i += 1;
    }
    entries
}

const LITERAL_LENGTH_ENTRIES: [FseEntry; 64] = zip_entries(
    [
        0, 16, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 32, 0, 0, 0, 0, 32, 0, 0, 32, 0, 32,
        0, 32, 0, 0, 32, 0, 32, 0, 32, 0, 0, 16, 32, 0, 0, 48, 16, 32, 32, 32, 32, 32, 32, 32, 32,
        0, 32, 32, 32, 32, 32, 32, 0, 0, 0, 0,
    ],
    [
        0, 0, 1, 3, 4, 6, 7, 9, 10, 12, 14, 16, 18, 19, 21, 22, 24, 25, 26, 27, 29, 31, 0, 1, 2, 4,
        5, 7, 8, 10, 11, 13, 16, 17, 19, 20, 22, 23, 25, 25, 26, 28, 30, 0, 1, 2, 3, 5, 6, 8, 9, 11,
        12, 15, 17, 18, 20, 21, 23, 24, 35, 34, 33, 32,
    ],
    [
        4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 6, 5, 5, 5, 5, 5, 5, 5, 5, 6, 6, 6, 4, 4, 5, 5, 5, 5, 5, 5, 5,
        6, 5, 5, 5, 5, 5, 5, 4, 4, 5, 6, 6, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 6, 5, 5, 5, 5, 5, 5, 6, 6,
        6, 6,
    ],
);

const OFFSET_CODE_ENTRIES: [FseEntry; 32] = zip_entries(
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 16, 0, 0, 0, 0, 16, 0, 0, 0, 16, 0, 0, 0, 0, 0,
        0, 0,
    ],
    [
        0, 6, 9, 15, 21, 3, 7, 12, 18, 23, 5, 8, 14, 20, 2, 7, 11, 17, 22, 4, 8, 13, 19, 1, 6, 10,
        16, 28, 27, 26, 25, 24,
    ],
    [
        5, 4, 5, 5, 5, 5, 4, 5, 5, 5, 5, 4, 5, 5, 5, 4, 5, 5, 5, 5, 4, 5, 5, 5, 4, 5, 5, 5, 5, 5, 5,
        5,
    ],
);

const MATCH_LENGTH_ENTRIES: [FseEntry; 64] = zip_entries(
    [
        0, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 16, 0, 32, 0, 32, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 32, 48, 16, 32, 32, 32, 32, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0,
    ],
    [
        0, 1, 2, 3, 5, 6, 8, 10, 13, 16, 19, 22, 25, 28, 31, 33, 35, 37, 39, 41, 43, 45, 1, 2, 3,
        4, 6, 7, 9, 12, 15, 18, 21, 24, 27, 30, 32, 34, 36, 38, 40, 42, 44, 1, 1, 2, 4, 5, 7, 8, 11,
        14, 17, 20, 23, 26, 29, 52, 51, 50, 49, 48, 47, 46,
    ],
    [
        6, 4, 5, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 4, 4, 5, 5, 5, 5, 6, 6, 6,
        6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
        6, 6,
    ],
);

/// Built-in literal length table (log 6).
pub const DEFAULT_LITERAL_LENGTH_TABLE: FseTableRef<'static> = FseTableRef {
    log2_size: 6,
    entries: &LITERAL_LENGTH_ENTRIES,
};

/// Built-in offset code table (log 5).
pub const DEFAULT_OFFSET_CODE_TABLE: FseTableRef<'static> = FseTableRef {
    log2_size: 5,
    entries: &OFFSET_CODE_ENTRIES,
};

/// Built-in match length table (log 6).
pub const DEFAULT_MATCH_LENGTH_TABLE: FseTableRef<'static> = FseTableRef {
    log2_size: 6,
    entries: &MATCH_LENGTH_ENTRIES,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fse::{
        LITERAL_LENGTH_DEFAULT_DISTRIBUTION, MATCH_LENGTH_DEFAULT_DISTRIBUTION,
        OFFSET_DEFAULT_DISTRIBUTION,
    };

    fn assert_builds_to(distribution: &[i16], table_log: u32, expected: FseTableRef<'_>) {
        let mut table = FseTable::with_capacity(9);
        table
            .build(distribution, distribution.len() - 1, table_log)
            .unwrap();
        assert_eq!(table.log2_size(), expected.log2_size);
        assert_eq!(table.as_table_ref().entries, expected.entries);
    }

    #[test]
    fn test_builtin_tables_match_default_distributions() {
        assert_builds_to(&LITERAL_LENGTH_DEFAULT_DISTRIBUTION, 6, DEFAULT_LITERAL_LENGTH_TABLE);
        assert_builds_to(&OFFSET_DEFAULT_DISTRIBUTION, 5, DEFAULT_OFFSET_CODE_TABLE);
        assert_builds_to(&MATCH_LENGTH_DEFAULT_DISTRIBUTION, 6, DEFAULT_MATCH_LENGTH_TABLE);
    }

    #[test]
    fn test_every_state_transitions_inside_table() {
        let mut table = FseTable::with_capacity(9);
        table.build(&MATCH_LENGTH_DEFAULT_DISTRIBUTION, 52, 6).unwrap();
        let view = table.as_table_ref();
        for entry in view.entries {
            let highest = entry.new_state as usize + (1 << entry.number_of_bits) - 1;
            assert!(highest < view.entries.len());
        }
    }

    #[test]
    fn test_rle_table() {
        let mut table = FseTable::with_capacity(5);
        table.init_rle(7);
        let view = table.as_table_ref();
        assert_eq!(view.log2_size, 0);
        assert_eq!(view.entries, &[FseEntry::new(0, 7, 0)]);
    }

    #[test]
    fn test_table_larger_than_capacity_rejected() {
        let mut table = FseTable::with_capacity(5);
        assert!(table.build(&MATCH_LENGTH_DEFAULT_DISTRIBUTION, 52, 6).is_err());
    }
}
