//! Huffman compression tables.
//!
//! Code lengths come from a classic two-queue Huffman tree over the
//! frequency-sorted leaves, then get limited to the requested maximum by
//! redistributing the code space the clamped leaves took. Codes are
//! canonical: within a length, symbols get increasing values in symbol
//! order.

use tessera_core::{Error, Result};

use super::{MAX_FSE_TABLE_LOG, MAX_SYMBOL, MAX_SYMBOL_COUNT, MAX_TABLE_LOG, MIN_TABLE_LOG};
use crate::bits::{highest_bit, BitWriter};
use crate::fse::{self, min_table_log, normalize_counts, optimal_table_log, write_normalized_counts, FseCompressionTable};
use crate::histogram;

const NO_SYMBOL: usize = usize::MAX;

/// Tree nodes: leaves at `[0, 256)`, internal nodes from 256 up.
#[derive(Debug, Clone)]
struct NodeTable {
    count: [u32; 2 * MAX_SYMBOL_COUNT - 1],
    parents: [u16; 2 * MAX_SYMBOL_COUNT - 1],
    symbols: [u8; 2 * MAX_SYMBOL_COUNT - 1],
    number_of_bits: [u8; 2 * MAX_SYMBOL_COUNT - 1],
}

impl NodeTable {
    fn new() -> Self {
        Self {
            count: [0; 2 * MAX_SYMBOL_COUNT - 1],
            parents: [0; 2 * MAX_SYMBOL_COUNT - 1],
            symbols: [0; 2 * MAX_SYMBOL_COUNT - 1],
            number_of_bits: [0; 2 * MAX_SYMBOL_COUNT - 1],
        }
    }

    fn reset(&mut self) {
        self.count.fill(0);
        self.parents.fill(0);
        self.symbols.fill(0);
        self.number_of_bits.fill(0);
    }

    fn copy_node(&mut self, from: usize, to: usize) {
        self.count[to] = self.count[from];
        self.parents[to] = self.parents[from];
        self.symbols[to] = self.symbols[from];
        self.number_of_bits[to] = self.number_of_bits[from];
    }
}

/// Scratch reused across table builds and serializations.
#[derive(Debug, Clone)]
pub struct HuffmanWorkspace {
    nodes: NodeTable,
    entries_per_rank: [u16; MAX_TABLE_LOG as usize + 1],
    values_per_rank: [u16; MAX_TABLE_LOG as usize + 1],
    rank_last: [usize; MAX_TABLE_LOG as usize + 2],

    weights: [u8; MAX_SYMBOL_COUNT],
    normalized: [i16; MAX_SYMBOL_COUNT],
}

impl Default for HuffmanWorkspace {
    fn default() -> Self {
        Self {
            nodes: NodeTable::new(),
            entries_per_rank: [0; MAX_TABLE_LOG as usize + 1],
            values_per_rank: [0; MAX_TABLE_LOG as usize + 1],
            rank_last: [NO_SYMBOL; MAX_TABLE_LOG as usize + 2],
            weights: [0; MAX_SYMBOL_COUNT],
            normalized: [0; MAX_SYMBOL_COUNT],
        }
    }
}

/// Code table for compressing literals.
#[derive(Debug, Clone)]
pub struct HuffmanCompressionTable {
    values: [u16; MAX_SYMBOL_COUNT],
    number_of_bits: [u8; MAX_SYMBOL_COUNT],
    max_symbol: usize,
    max_number_of_bits: u32,
}

impl Default for HuffmanCompressionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanCompressionTable {
    pub fn new() -> Self {
        Self {
            values: [0; MAX_SYMBOL_COUNT],
            number_of_bits: [0; MAX_SYMBOL_COUNT],
            max_symbol: 0,
            max_number_of_bits: 0,
        }
    }

    /// Pick the maximum code length for `input_size` symbols up to
    /// `max_symbol`, no longer than `max_number_of_bits`.
    pub fn optimal_number_of_bits(max_number_of_bits: u32, input_size: usize, max_symbol: usize) -> Result<u32> {
        if input_size <= 1 {
            return Err(Error::invalid_argument(
                "Huffman needs at least two symbols; use RLE instead",
            ));
        }

        // Small inputs tolerate shorter codes
        let from_size = highest_bit((input_size - 1) as u32) as i64 - 1;
        let mut result = (max_number_of_bits as i64).min(from_size);
        result = result.max(min_table_log(input_size, max_symbol) as i64);
        result = result.max(MIN_TABLE_LOG as i64);
        Ok(result.min(MAX_TABLE_LOG as i64) as u32)
    }

    /// Build codes for `counts[..=max_symbol]`, no longer than
    /// `max_number_of_bits`. At least two symbols must be present.
    pub fn initialize(
        &mut self,
        counts: &[u32],
        max_symbol: usize,
        max_number_of_bits: u32,
        workspace: &mut HuffmanWorkspace,
    ) -> Result<()> {
        if max_symbol > MAX_SYMBOL {
            return Err(Error::invalid_argument("Max symbol value too large"));
        }
        if counts[..=max_symbol].iter().filter(|&&c| c > 0).count() < 2 {
            return Err(Error::invalid_argument("Huffman needs at least two distinct symbols"));
        }

        workspace.entries_per_rank.fill(0);
        workspace.values_per_rank.fill(0);

        let last_non_zero = build_tree(counts, max_symbol, &mut workspace.nodes);
        let max_number_of_bits =
            set_max_height(&mut workspace.nodes, last_non_zero, max_number_of_bits, &mut workspace.rank_last);
        if max_number_of_bits > MAX_TABLE_LOG {
            return Err(Error::invalid_argument(
                "Max number of bits larger than max table size",
            ));
        }

        let nodes = &workspace.nodes;
        for node in 0..=max_symbol {
            self.number_of_bits[nodes.symbols[node] as usize] = nodes.number_of_bits[node];
        }
        self.number_of_bits[max_symbol + 1..].fill(0);

        for node in 0..=last_non_zero {
            workspace.entries_per_rank[nodes.number_of_bits[node] as usize] += 1;
        }

        // Starting value of each length, shortest codes last
        let mut starting_value = 0u16;
        for rank in (1..=max_number_of_bits as usize).rev() {
            workspace.values_per_rank[rank] = starting_value;
            starting_value += workspace.entries_per_rank[rank];
            starting_value >>= 1;
        }

        for symbol in 0..=max_symbol {
            let rank = self.number_of_bits[symbol] as usize;
            self.values[symbol] = workspace.values_per_rank[rank];
            workspace.values_per_rank[rank] = workspace.values_per_rank[rank].wrapping_add(1);
        }

        self.max_symbol = max_symbol;
        self.max_number_of_bits = max_number_of_bits;
        Ok(())
    }

    /// Largest symbol covered by the table.
    pub fn max_symbol(&self) -> usize {
        self.max_symbol
    }

    /// Code length of `symbol`; 0 when the symbol has no code.
    pub fn number_of_bits(&self, symbol: u8) -> u32 {
        self.number_of_bits[symbol as usize] as u32
    }

    /// Whether every symbol present in `counts` has a code.
    pub fn is_valid(&self, counts: &[u32], max_symbol: usize) -> bool {
        if max_symbol > self.max_symbol {
            return false;
        }
        counts[..=max_symbol]
            .iter()
            .zip(self.number_of_bits.iter())
            .all(|(&count, &bits)| count == 0 || bits != 0)
    }

    /// Size in bytes the symbols of `counts` would take with this table.
    pub fn estimate_compressed_size(&self, counts: &[u32], max_symbol: usize) -> usize {
        let bits: usize = counts[..=max_symbol.min(self.max_symbol)]
            .iter()
            .zip(self.number_of_bits.iter())
            .map(|(&count, &bits)| count as usize * bits as usize)
            .sum();
        bits >> 3
    }

    /// Append the code for `symbol`.
    #[inline]
    pub fn encode_symbol(&self, writer: &mut BitWriter<'_>, symbol: u8) {
        writer.add_bits_fast(
            self.values[symbol as usize] as u64,
            self.number_of_bits[symbol as usize] as u32,
        );
    }

    /// Serialize the table description; returns its size.
    ///
    /// Weights are FSE compressed when that beats the direct 4-bit form.
    pub fn write(&self, output: &mut [u8], workspace: &mut HuffmanWorkspace) -> Result<usize> {
        if output.is_empty() {
            return Err(Error::buffer_too_small(1, 0));
        }

        let max_symbol = self.max_symbol;
        // The last symbol's weight is implied
        for symbol in 0..max_symbol {
            let bits = self.number_of_bits[symbol] as u32;
            workspace.weights[symbol] = if bits == 0 {
                0
            } else {
                (self.max_number_of_bits + 1 - bits) as u8
            };
        }

        // Weights that do not fit compressed fall back to the direct form
        let size = compress_weights(&mut output[1..], max_symbol, workspace).unwrap_or(0);
        if size > 1 && size < max_symbol / 2 {
            output[0] = size as u8;
            return Ok(size + 1);
        }

        let entry_count = max_symbol;
        if entry_count > 128 {
            return Err(Error::invalid_argument(
                "Huffman weights too many for the direct representation",
            ));
        }
        let size = (entry_count + 1) / 2;
        if size + 1 > output.len() {
            return Err(Error::buffer_too_small(size + 1, output.len()));
        }

        output[0] = (127 + entry_count) as u8;
        workspace.weights[max_symbol] = 0;
        for (i, byte) in output[1..=size].iter_mut().enumerate() {
            *byte = (workspace.weights[2 * i] << 4) + workspace.weights[2 * i + 1];
        }
        Ok(size + 1)
    }
}

/// FSE-compress the first `length` weights of the workspace. Returns 0 when
/// not compressible and 1 when every weight is the same.
fn compress_weights(output: &mut [u8], length: usize, workspace: &mut HuffmanWorkspace) -> Result<usize> {
    if length <= 1 {
        return Ok(0);
    }

    let weights = &workspace.weights[..length];
    let mut counts = [0u32; MAX_SYMBOL_COUNT];
    histogram::count(weights, &mut counts);

    let max_symbol = histogram::find_max_symbol(&counts, MAX_TABLE_LOG as usize);
    let max_count = histogram::find_largest_count(&counts, max_symbol);
    if max_count as usize == length {
        return Ok(1);
    }
    if max_count == 1 {
        return Ok(0);
    }

    let table_log = optimal_table_log(MAX_FSE_TABLE_LOG, length, max_symbol)?;
    normalize_counts(&mut workspace.normalized, table_log, &counts, length, max_symbol)?;

    let header_size = write_normalized_counts(output, &workspace.normalized, max_symbol, table_log)?;
    let table = FseCompressionTable::new(&workspace.normalized, max_symbol, table_log);
    let compressed_size = fse::compress(&mut output[header_size..], weights, &table)?;
    if compressed_size == 0 {
        return Ok(0);
    }
    Ok(header_size + compressed_size)
}

/// Build the tree and return the position of the last leaf with a
/// non-zero count. Leaves end up sorted by descending count, ties in
/// symbol order.
fn build_tree(counts: &[u32], max_symbol: usize, nodes: &mut NodeTable) -> usize {
    nodes.reset();

    for symbol in 0..=max_symbol {
        let count = counts[symbol];
        let mut position = symbol;
        while position > 0 && count > nodes.count[position - 1] {
            nodes.copy_node(position - 1, position);
            position -= 1;
        }
        nodes.count[position] = count;
        nodes.symbols[position] = symbol as u8;
    }

    let mut last_non_zero = max_symbol;
    while nodes.count[last_non_zero] == 0 {
        last_non_zero -= 1;
    }

    // The two rarest leaves make the first internal node
    let mut non_leaf_start = MAX_SYMBOL_COUNT;
    let mut current = non_leaf_start;
    let mut current_leaf = last_non_zero as isize;
    nodes.count[current] = nodes.count[last_non_zero] + nodes.count[last_non_zero - 1];
    nodes.parents[last_non_zero] = current as u16;
    nodes.parents[last_non_zero - 1] = current as u16;
    current += 1;
    current_leaf -= 2;

    let root = MAX_SYMBOL_COUNT + last_non_zero - 1;

    // Sentinels: internal nodes not built yet never win a comparison
    for count in &mut nodes.count[current..=root] {
        *count = 1 << 30;
    }

    while current <= root {
        let mut pick = || {
            if current_leaf >= 0 && nodes.count[current_leaf as usize] < nodes.count[non_leaf_start] {
                current_leaf -= 1;
                (current_leaf + 1) as usize
            } else {
                non_leaf_start += 1;
                non_leaf_start - 1
            }
        };
        let child1 = pick();
        let child2 = pick();

        nodes.count[current] = nodes.count[child1] + nodes.count[child2];
        nodes.parents[child1] = current as u16;
        nodes.parents[child2] = current as u16;
        current += 1;
    }

    nodes.number_of_bits[root] = 0;
    for node in (MAX_SYMBOL_COUNT..root).rev() {
        nodes.number_of_bits[node] = nodes.number_of_bits[nodes.parents[node] as usize] + 1;
    }
    for node in 0..=last_non_zero {
        nodes.number_of_bits[node] = nodes.number_of_bits[nodes.parents[node] as usize] + 1;
    }

    last_non_zero
}

/// Limit code lengths to `max_number_of_bits` while keeping the Kraft sum
/// exactly one; returns the resulting maximum length.
fn set_max_height(
    nodes: &mut NodeTable,
    last_non_zero: usize,
    max_number_of_bits: u32,
    rank_last: &mut [usize; MAX_TABLE_LOG as usize + 2],
) -> u32 {
    let largest_bits = nodes.number_of_bits[last_non_zero] as u32;
    if largest_bits <= max_number_of_bits {
        return largest_bits;
    }

    // Clamp the long codes and sum the code space they borrowed, in units
    // of the deepest level
    let mut total_cost = 0i64;
    let base_cost = 1i64 << (largest_bits - max_number_of_bits);
    let mut n = last_non_zero;
    while nodes.number_of_bits[n] as u32 > max_number_of_bits {
        total_cost += base_cost - (1i64 << (largest_bits - nodes.number_of_bits[n] as u32));
        nodes.number_of_bits[n] = max_number_of_bits as u8;
        n -= 1;
    }
    while nodes.number_of_bits[n] as u32 == max_number_of_bits {
        n -= 1;
    }

    // Now in units of a code at the maximum length
    total_cost >>= largest_bits - max_number_of_bits;

    // Last (rarest) position of each length below the maximum, keyed by
    // the length difference
    rank_last.fill(NO_SYMBOL);
    let mut current_bits = max_number_of_bits;
    for position in (0..=n).rev() {
        let bits = nodes.number_of_bits[position] as u32;
        if bits >= current_bits {
            continue;
        }
        current_bits = bits;
        rank_last[(max_number_of_bits - current_bits) as usize] = position;
    }

    // Repay by lengthening short codes
    while total_cost > 0 {
        let mut to_decrease = highest_bit(total_cost as u32) as usize + 1;
        while to_decrease > 1 {
            let high = rank_last[to_decrease];
            let low = rank_last[to_decrease - 1];
            if high == NO_SYMBOL {
                to_decrease -= 1;
                continue;
            }
            if low == NO_SYMBOL {
                break;
            }
            if nodes.count[high] as u64 <= 2 * nodes.count[low] as u64 {
                break;
            }
            to_decrease -= 1;
        }
        while to_decrease <= MAX_TABLE_LOG as usize && rank_last[to_decrease] == NO_SYMBOL {
            to_decrease += 1;
        }

        total_cost -= 1 << (to_decrease - 1);
        if rank_last[to_decrease - 1] == NO_SYMBOL {
            rank_last[to_decrease - 1] = rank_last[to_decrease];
        }
        nodes.number_of_bits[rank_last[to_decrease]] += 1;
        if rank_last[to_decrease] == 0 {
            rank_last[to_decrease] = NO_SYMBOL;
        } else {
            rank_last[to_decrease] -= 1;
            if nodes.number_of_bits[rank_last[to_decrease]] as u32
                != max_number_of_bits - to_decrease as u32
            {
                rank_last[to_decrease] = NO_SYMBOL;
            }
        }
    }

    // Overpaid: give the surplus back to codes at the maximum length
    while total_cost < 0 {
        if rank_last[1] == NO_SYMBOL {
            while nodes.number_of_bits[n] as u32 == max_number_of_bits {
                n -= 1;
            }
            nodes.number_of_bits[n + 1] -= 1;
            rank_last[1] = n + 1;
            total_cost += 1;
            continue;
        }
        nodes.number_of_bits[rank_last[1] + 1] -= 1;
        rank_last[1] += 1;
        total_cost += 1;
    }

    max_number_of_bits
}
