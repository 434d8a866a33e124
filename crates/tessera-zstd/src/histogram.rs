//! Symbol frequency helpers shared by the entropy coders.

/// Count byte occurrences of `input` into `counts`, which is cleared first.
pub fn count(input: &[u8], counts: &mut [u32; 256]) {
    counts.fill(0);
    for &byte in input {
        counts[byte as usize] += 1;
    }
}

/// Highest symbol with a non-zero count, or 0 when every count is zero.
pub fn find_max_symbol(counts: &[u32], max_symbol: usize) -> usize {
    let mut symbol = max_symbol.min(counts.len().saturating_sub(1));
    while symbol > 0 && counts[symbol] == 0 {
        symbol -= 1;
    }
    symbol
}

/// Largest count among `counts[..=max_symbol]`.
pub fn find_largest_count(counts: &[u32], max_symbol: usize) -> u32 {
    counts[..=max_symbol].iter().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_resets_previous_values() {
        let mut counts = [7u32; 256];
        count(b"abracadabra", &mut counts);
        assert_eq!(counts[b'a' as usize], 5);
        assert_eq!(counts[b'b' as usize], 2);
        assert_eq!(counts[b'z' as usize], 0);
        assert_eq!(counts.iter().sum::<u32>(), 11);
    }

    #[test]
    fn test_max_symbol_and_largest() {
        let mut counts = [0u32; 256];
        count(&[1, 1, 1, 9, 4], &mut counts);
        assert_eq!(find_max_symbol(&counts, 255), 9);
        assert_eq!(find_largest_count(&counts, 9), 3);
    }

    #[test]
    fn test_max_symbol_of_empty_histogram() {
        let counts = [0u32; 256];
        assert_eq!(find_max_symbol(&counts, 255), 0);
        assert_eq!(find_largest_count(&counts, 0), 0);
    }
}
