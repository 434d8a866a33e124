//! Zstd block decoding.
//!
//! ## Block Structure
//!
//! A compressed block contains:
//! 1. Literals Section - raw, RLE or Huffman-coded bytes
//! 2. Sequences Section - LZ77 commands (literal length, offset, match length)
//!
//! Sequences are executed directly against the frame output, so matches
//! can reach into earlier blocks of the same frame.
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1.1](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1.1)

mod literals;
mod sequences;

pub use literals::{LiteralsBlockType, LiteralsDecoder};
pub use sequences::{RepeatedOffsets, SequenceDecoder, SymbolEncodingType};

use tessera_core::{Error, Result};

use crate::frame::{MAX_BLOCK_SIZE, MAX_WINDOW_SIZE, MIN_BLOCK_SIZE};

/// Largest literal length code.
pub const MAX_LITERAL_LENGTH_SYMBOL: usize = 35;

/// Largest match length code.
pub const MAX_MATCH_LENGTH_SYMBOL: usize = 52;

/// Largest offset code a decoder accepts.
pub const DEFAULT_MAX_OFFSET_CODE_SYMBOL: usize = 28;

/// Largest offset code an encoder may emit.
pub const MAX_OFFSET_CODE_SYMBOL: usize = 31;

pub const LITERAL_LENGTH_TABLE_LOG: u32 = 9;
pub const MATCH_LENGTH_TABLE_LOG: u32 = 9;
pub const OFFSET_TABLE_LOG: u32 = 8;

/// Sequence counts from here on use the 3-byte form.
pub const LONG_NUMBER_OF_SEQUENCES: usize = 0x7F00;

/// Shortest match a sequence can describe.
pub const MIN_MATCH: usize = 3;

/// Literal length baseline per code.
pub const LITERAL_LENGTH_BASE: [u32; 36] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20, 22, 24, 28, 32, 40, 48, 64, 0x80, 0x100,
    0x200, 0x400, 0x800, 0x1000, 0x2000, 0x4000, 0x8000, 0x10000,
];

/// Extra bits per literal length code.
pub const LITERAL_LENGTH_BITS: [u8; 36] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 4, 6, 7, 8, 9, 10, 11, 12, 13, 14,
    15, 16,
];

/// Match length baseline per code.
pub const MATCH_LENGTH_BASE: [u32; 53] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
    32, 33, 34, 35, 37, 39, 41, 43, 47, 51, 59, 67, 83, 99, 0x83, 0x103, 0x203, 0x403, 0x803, 0x1003, 0x2003,
    0x4003, 0x8003, 0x10003,
];

/// Extra bits per match length code.
pub const MATCH_LENGTH_BITS: [u8; 53] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1,
    2, 2, 3, 3, 4, 4, 5, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
];

/// Copy a raw block to `output[position..]`. Returns the bytes written.
pub fn decode_raw_block(payload: &[u8], output: &mut [u8], position: usize) -> Result<usize> {
    let end = position + payload.len();
    if end > output.len() {
        return Err(Error::buffer_too_small(end, output.len()));
    }
    output[position..end].copy_from_slice(payload);
    Ok(payload.len())
}

/// Fill `size` bytes of `output[position..]` with `value`. Returns the
/// bytes written.
pub fn decode_rle_block(value: u8, size: usize, output: &mut [u8], position: usize) -> Result<usize> {
    let end = position + size;
    if end > output.len() {
        return Err(Error::buffer_too_small(end, output.len()));
    }
    output[position..end].fill(value);
    Ok(size)
}

/// Decoder state for the compressed blocks of one frame.
#[derive(Debug, Clone, Default)]
pub struct BlockDecoder {
    literals: LiteralsDecoder,
    sequences: SequenceDecoder,
}

impl BlockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: forget the Huffman table, the sequence tables and
    /// the repeat offsets.
    pub fn reset(&mut self) {
        self.literals.reset();
        self.sequences.reset();
    }

    /// Decode a compressed block into `output[position..]`.
    ///
    /// `frame_start` bounds how far back matches may reach. Returns the
    /// bytes written.
    pub fn decode_compressed_block(
        &mut self,
        block: &[u8],
        output: &mut [u8],
        frame_start: usize,
        position: usize,
        window_size: Option<u64>,
    ) -> Result<usize> {
        if block.len() > MAX_BLOCK_SIZE {
            return Err(Error::corrupted("Block exceeds maximum size"));
        }
        if block.len() < MIN_BLOCK_SIZE {
            return Err(Error::corrupted("Compressed block size too small"));
        }

        let literals_size = self.literals.decode(block)?;

        if window_size.is_some_and(|size| size > MAX_WINDOW_SIZE) {
            return Err(Error::unsupported("Window size too large (not yet supported)"));
        }

        let end = self.sequences.decode(
            &block[literals_size..],
            self.literals.literals(),
            output,
            frame_start,
            position,
        )?;
        Ok(end - position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tables_are_contiguous() {
        for code in 0..MAX_LITERAL_LENGTH_SYMBOL {
            let next = LITERAL_LENGTH_BASE[code] + (1 << LITERAL_LENGTH_BITS[code]);
            assert_eq!(next, LITERAL_LENGTH_BASE[code + 1], "literal length code {code}");
        }
        for code in 0..MAX_MATCH_LENGTH_SYMBOL {
            let next = MATCH_LENGTH_BASE[code] + (1 << MATCH_LENGTH_BITS[code]);
            assert_eq!(next, MATCH_LENGTH_BASE[code + 1], "match length code {code}");
        }
    }

    #[test]
    fn test_raw_and_rle_blocks() {
        let mut output = [0u8; 8];
        assert_eq!(decode_raw_block(b"abc", &mut output, 1).unwrap(), 3);
        assert_eq!(decode_rle_block(b'z', 4, &mut output, 4).unwrap(), 4);
        assert_eq!(&output, b"\0abczzzz");

        assert!(decode_raw_block(b"abc", &mut output, 6).is_err());
        assert!(decode_rle_block(b'z', 9, &mut output, 0).is_err());
    }

    #[test]
    fn test_literals_only_block() {
        let mut decoder = BlockDecoder::new();
        let mut output = [0u8; 16];
        // Raw literals "hi!", zero sequences
        let block = [3 << 3, b'h', b'i', b'!', 0];
        let written = decoder.decode_compressed_block(&block, &mut output, 0, 2, None).unwrap();
        assert_eq!(written, 3);
        assert_eq!(&output[2..5], b"hi!");
    }

    #[test]
    fn test_block_size_limits() {
        let mut decoder = BlockDecoder::new();
        let mut output = [0u8; 16];
        assert!(decoder.decode_compressed_block(&[0], &mut output, 0, 0, None).is_err());
        let oversized = vec![0u8; MAX_BLOCK_SIZE + 1];
        assert!(decoder.decode_compressed_block(&oversized, &mut output, 0, 0, None).is_err());
    }

    #[test]
    fn test_window_above_limit_unsupported() {
        let mut decoder = BlockDecoder::new();
        let mut output = [0u8; 16];
        let block = [0, 0];
        let err = decoder
            .decode_compressed_block(&block, &mut output, 0, 0, Some(MAX_WINDOW_SIZE * 2))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(decoder
            .decode_compressed_block(&block, &mut output, 0, 0, Some(MAX_WINDOW_SIZE))
            .is_ok());
    }
}
