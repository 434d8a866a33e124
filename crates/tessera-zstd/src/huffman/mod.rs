//! Huffman coding for Zstandard literals.
//!
//! ## Overview
//!
//! Zstd uses canonical Huffman codes described by per-symbol weights: a
//! weight `w > 0` means a code of `max_bits + 1 - w` bits, 0 means absent.
//! The weight of the last symbol is implied by the others. The description
//! is either:
//! - FSE-compressed (header byte below 128 gives the compressed size)
//! - Direct, two 4-bit weights per byte (header byte is `127 + count`)
//!
//! Literals are coded as one stream, or as four streams behind a 6-byte
//! jump table holding the sizes of the first three.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.2](https://datatracker.ietf.org/doc/html/rfc8878#section-4.2)

mod decoder;
mod encoder;
mod table;

pub use decoder::HuffmanDecoder;
pub use encoder::{compress_4_streams, compress_single_stream};
pub use table::{HuffmanCompressionTable, HuffmanWorkspace};

/// Largest literal value.
pub const MAX_SYMBOL: usize = 255;

/// Number of literal values.
pub const MAX_SYMBOL_COUNT: usize = MAX_SYMBOL + 1;

/// Longest code a decoder must accept.
pub const MAX_TABLE_LOG: u32 = 12;

/// Lower bound on the maximum code length picked by the encoder.
pub const MIN_TABLE_LOG: u32 = 5;

/// Decoding table size at the longest code length.
pub const MAX_TABLE_SIZE: usize = 1 << MAX_TABLE_LOG;

/// Table log limit for FSE-compressed weights.
pub const MAX_FSE_TABLE_LOG: u32 = 6;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Build a table for `input`, serialize it, read it back and decode.
    fn roundtrip(input: &[u8], four_streams: bool) -> usize {
        let mut counts = [0u32; 256];
        histogram::count(input, &mut counts);
        let max_symbol = histogram::find_max_symbol(&counts, MAX_SYMBOL);
        let max_bits = HuffmanCompressionTable::optimal_number_of_bits(11, input.len(), max_symbol).unwrap();

        let mut table = HuffmanCompressionTable::new();
        let mut workspace = HuffmanWorkspace::default();
        table.initialize(&counts, max_symbol, max_bits, &mut workspace).unwrap();

        let mut compressed = vec![0u8; input.len() * 2 + 512];
        let header_size = table.write(&mut compressed, &mut workspace).unwrap();
        let size = if four_streams {
            compress_4_streams(&mut compressed[header_size..], input, &table).unwrap()
        } else {
            compress_single_stream(&mut compressed[header_size..], input, &table).unwrap()
        };
        assert!(size > 0);
        let compressed = &compressed[..header_size + size];

        let mut decoder = HuffmanDecoder::new();
        assert_eq!(decoder.read_table(compressed).unwrap(), header_size);
        let mut decoded = vec![0u8; input.len()];
        if four_streams {
            decoder.decode_4_streams(&compressed[header_size..], &mut decoded).unwrap();
        } else {
            decoder.decode_single_stream(&compressed[header_size..], &mut decoded).unwrap();
        }
        assert_eq!(decoded, input);
        compressed.len()
    }

    #[test]
    fn test_roundtrip_text_single_stream() {
        let text = b"Huffman coding assigns short codes to frequent bytes and long codes to rare ones.";
        roundtrip(text, false);
    }

    #[test]
    fn test_roundtrip_skewed_four_streams() {
        let mut rng = StdRng::seed_from_u64(3);
        let input: Vec<u8> = (0..5000)
            .map(|_| if rng.gen_bool(0.7) { b'e' } else { rng.gen_range(b'a'..=b'z') })
            .collect();
        let size = roundtrip(&input, true);
        assert!(size < input.len() / 2);
    }

    #[test]
    fn test_roundtrip_full_alphabet() {
        // Every byte value present, most of them once: the weights go
        // through FSE and the rare codes hit the length limit
        let mut rng = StdRng::seed_from_u64(5);
        let mut input: Vec<u8> = (0..=255u8).collect();
        input.extend((0..20_000).map(|_| rng.gen_range(0..16u8) * rng.gen_range(1..3u8)));
        roundtrip(&input, true);
        roundtrip(&input[..1000], false);
    }

    #[test]
    fn test_roundtrip_every_tail_length() {
        let mut rng = StdRng::seed_from_u64(9);
        for len in 2..40 {
            let mut input: Vec<u8> = (0..len).map(|_| rng.gen_range(0..8u8)).collect();
            input[0] = 0;
            input[1] = 1;
            roundtrip(&input, false);
            if len > 9 {
                roundtrip(&input, true);
            }
        }
    }

    #[test]
    fn test_truncated_stream_detected() {
        let input: Vec<u8> = (0..400u32).map(|i| (i % 7) as u8 * 3).collect();
        let mut counts = [0u32; 256];
        histogram::count(&input, &mut counts);
        let max_symbol = histogram::find_max_symbol(&counts, MAX_SYMBOL);

        let mut table = HuffmanCompressionTable::new();
        let mut workspace = HuffmanWorkspace::default();
        table.initialize(&counts, max_symbol, 11, &mut workspace).unwrap();
        let mut compressed = vec![0u8; 1024];
        let header_size = table.write(&mut compressed, &mut workspace).unwrap();
        let size = compress_single_stream(&mut compressed[header_size..], &input, &table).unwrap();

        let mut decoder = HuffmanDecoder::new();
        decoder.read_table(&compressed).unwrap();
        // Asking for more symbols than were written
        let mut decoded = vec![0u8; input.len() + 16];
        let stream = &compressed[header_size..header_size + size];
        assert!(decoder.decode_single_stream(stream, &mut decoded).is_err());
    }

    #[test]
    fn test_four_streams_skip_tiny_input() {
        let mut counts = [0u32; 256];
        counts[..2].copy_from_slice(&[5, 4]);
        let mut table = HuffmanCompressionTable::new();
        let mut workspace = HuffmanWorkspace::default();
        table.initialize(&counts, 1, 11, &mut workspace).unwrap();
        let mut output = [0u8; 64];
        assert_eq!(compress_4_streams(&mut output, &[0, 1, 0, 1, 0, 1, 0, 1, 0], &table).unwrap(), 0);
    }
}
