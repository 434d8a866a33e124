//! Block encoding.
//!
//! Each block becomes an RLE block when all its bytes are equal, a
//! compressed block when that saves enough, and a raw block otherwise.
//! State that outlives a block (match finder tables, offset history,
//! Huffman and FSE tables) advances only when the block is emitted
//! compressed, since that is the only case in which the decoder sees it.

use tessera_core::{Error, Result};
use tracing::trace;

use super::literals::{minimum_gain, LiteralsEncoder};
use super::match_finder::{self, BlockCompressionState, OffsetHistory};
use super::parameters::{CompressionParameters, Strategy};
use super::sequences::SequenceEncoder;
use super::store::SequenceStore;
use crate::frame::{BlockHeader, BlockType, MAX_BLOCK_SIZE};

/// Blocks shorter than this are stored raw without trying.
const MIN_COMPRESSIBLE_BLOCK: usize = 6;

/// Per-frame block encoder.
#[derive(Debug, Clone)]
pub struct BlockCompressor {
    parameters: CompressionParameters,
    state: BlockCompressionState,
    offsets: OffsetHistory,
    store: SequenceStore,
    literals: LiteralsEncoder,
    sequences: SequenceEncoder,
    scratch: Vec<u8>,
}

impl BlockCompressor {
    pub fn new(parameters: CompressionParameters) -> Self {
        Self {
            state: BlockCompressionState::new(&parameters),
            parameters,
            offsets: OffsetHistory::new(),
            store: SequenceStore::new(),
            literals: LiteralsEncoder::new(),
            sequences: SequenceEncoder::new(),
            scratch: vec![0; MAX_BLOCK_SIZE],
        }
    }

    pub fn parameters(&self) -> &CompressionParameters {
        &self.parameters
    }

    /// Encode `input[start..end]` as one block (header included) at
    /// `output[position..]`. Returns the bytes written.
    ///
    /// `input` is the whole frame content so matches can reach into the
    /// blocks before `start`.
    pub fn write_block(
        &mut self,
        input: &[u8],
        start: usize,
        end: usize,
        last: bool,
        output: &mut [u8],
        position: usize,
    ) -> Result<usize> {
        let block = &input[start..end];

        if let Some(&value) = block.first() {
            if block.iter().all(|&byte| byte == value) {
                trace!(size = block.len(), "RLE block");
                BlockHeader::new(last, BlockType::Rle, block.len()).write(output, position)?;
                let payload = position + BlockHeader::SIZE;
                if payload >= output.len() {
                    return Err(Error::buffer_too_small(payload + 1, output.len()));
                }
                output[payload] = value;
                return Ok(BlockHeader::SIZE + 1);
            }
        }

        let compressed = if block.len() < MIN_COMPRESSIBLE_BLOCK {
            None
        } else {
            match self.compress_sequences(input, start, end) {
                Ok(size) => size,
                Err(err) => {
                    trace!(%err, "Block encoding failed");
                    None
                }
            }
        };

        match compressed {
            Some(size) => {
                let payload = position + BlockHeader::SIZE;
                if payload + size > output.len() {
                    return Err(Error::buffer_too_small(payload + size, output.len()));
                }
                BlockHeader::new(last, BlockType::Compressed, size).write(output, position)?;
                output[payload..payload + size].copy_from_slice(&self.scratch[..size]);

                self.offsets.commit();
                self.literals.commit();
                self.sequences.commit();
                trace!(size = block.len(), compressed = size, "Compressed block");
                Ok(BlockHeader::SIZE + size)
            }
            None => {
                let payload = position + BlockHeader::SIZE;
                if payload + block.len() > output.len() {
                    return Err(Error::buffer_too_small(payload + block.len(), output.len()));
                }
                BlockHeader::new(last, BlockType::Raw, block.len()).write(output, position)?;
                output[payload..payload + block.len()].copy_from_slice(block);
                trace!(size = block.len(), "Raw block");
                Ok(BlockHeader::SIZE + block.len())
            }
        }
    }

    /// Encode literals and sequences of `input[start..end]` into the
    /// scratch buffer. Returns the payload size, or `None` when the result
    /// would not save enough over a raw block.
    fn compress_sequences(&mut self, input: &[u8], start: usize, end: usize) -> Result<Option<usize>> {
        let parameters = self.parameters;
        let size = end - start;

        self.state.enforce_max_distance(end, parameters.window_size());
        self.store.reset();
        let remaining = match_finder::compress_block(
            input,
            start,
            end,
            &mut self.store,
            &mut self.state,
            &mut self.offsets,
            &parameters,
        );
        self.store.append_literals(&input[end - remaining..end]);
        self.store.generate_codes();

        let output = &mut self.scratch[..size];
        let bypass = parameters.strategy == Strategy::Fast && parameters.target_length > 0;
        let literals_size = self
            .literals
            .encode(output, &self.store.literals, parameters.strategy, bypass)?;
        let sequences_size = self
            .sequences
            .encode(&mut output[literals_size..], &self.store, parameters.strategy)?;

        let total = literals_size + sequences_size;
        if total > size - minimum_gain(size, parameters.strategy) {
            trace!(size, total, "Compression gain too small");
            return Ok(None);
        }
        Ok(Some(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{decode_raw_block, decode_rle_block, BlockDecoder};

    fn text(size: usize) -> Vec<u8> {
        let words: &[&[u8]] = &[b"lorem ", b"ipsum ", b"dolor ", b"sit ", b"amet ", b"consectetur "];
        let mut state = 11u32;
        let mut data = Vec::with_capacity(size + 12);
        while data.len() < size {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            data.extend_from_slice(words[(state >> 16) as usize % words.len()]);
        }
        data.truncate(size);
        data
    }

    /// Decode consecutive blocks written by `write_block`.
    fn decode_blocks(encoded: &[u8], size: usize) -> Vec<u8> {
        let mut decoder = BlockDecoder::new();
        let mut output = vec![0u8; size];
        let mut input = 0;
        let mut position = 0;
        loop {
            let header = BlockHeader::parse(&encoded[input..]).unwrap();
            input += BlockHeader::SIZE;
            let payload = &encoded[input..input + header.payload_size()];
            position += match header.block_type {
                BlockType::Raw => decode_raw_block(payload, &mut output, position).unwrap(),
                BlockType::Rle => decode_rle_block(payload[0], header.size, &mut output, position).unwrap(),
                BlockType::Compressed => decoder
                    .decode_compressed_block(payload, &mut output, 0, position, None)
                    .unwrap(),
            };
            input += header.payload_size();
            if header.last {
                break;
            }
        }
        assert_eq!(position, size);
        output
    }

    fn encode_blocks(input: &[u8], level: i32, block_size: usize) -> Vec<u8> {
        let mut compressor = BlockCompressor::new(CompressionParameters::compute(level, input.len()));
        let mut output = vec![0u8; input.len() + 1024];
        let mut position = 0;
        let mut start = 0;
        loop {
            let end = (start + block_size).min(input.len());
            let last = end == input.len();
            position += compressor
                .write_block(input, start, end, last, &mut output, position)
                .unwrap();
            start = end;
            if last {
                break;
            }
        }
        output.truncate(position);
        output
    }

    #[test]
    fn test_rle_block() {
        let mut compressor = BlockCompressor::new(CompressionParameters::compute(3, 1000));
        let input = vec![7u8; 1000];
        let mut output = [0u8; 8];
        assert_eq!(compressor.write_block(&input, 0, 1000, true, &mut output, 0).unwrap(), 4);
        let header = BlockHeader::parse(&output).unwrap();
        assert_eq!(header.block_type, BlockType::Rle);
        assert_eq!(header.size, 1000);
        assert_eq!(output[3], 7);

        // A single byte is a run too
        assert_eq!(compressor.write_block(&input, 0, 1, true, &mut output, 0).unwrap(), 4);
        assert_eq!(BlockHeader::parse(&output).unwrap().block_type, BlockType::Rle);
    }

    #[test]
    fn test_tiny_block_stays_raw() {
        let mut compressor = BlockCompressor::new(CompressionParameters::compute(3, 5));
        let mut output = [0u8; 16];
        let written = compressor.write_block(b"abcab", 0, 5, true, &mut output, 0).unwrap();
        assert_eq!(written, 8);
        assert_eq!(BlockHeader::parse(&output).unwrap().block_type, BlockType::Raw);
        assert_eq!(&output[3..8], b"abcab");
    }

    #[test]
    fn test_incompressible_block_stays_raw() {
        let mut state = 0x1234_5678u64;
        let input: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect();
        let mut compressor = BlockCompressor::new(CompressionParameters::compute(3, input.len()));
        let mut output = vec![0u8; 5000];
        let written = compressor.write_block(&input, 0, input.len(), true, &mut output, 0).unwrap();
        assert_eq!(written, input.len() + 3);
        assert_eq!(BlockHeader::parse(&output).unwrap().block_type, BlockType::Raw);
    }

    #[test]
    fn test_compressed_blocks_decode() {
        let input = text(100_000);
        for level in [-5, 1, 3, 9, 19] {
            let encoded = encode_blocks(&input, level, 16 * 1024);
            assert!(encoded.len() < input.len() / 2, "level {level}");
            assert_eq!(decode_blocks(&encoded, input.len()), input, "level {level}");
        }
    }

    #[test]
    fn test_mixed_block_kinds_decode() {
        let mut input = text(20_000);
        input.extend(std::iter::repeat(b'z').take(20_000));
        let mut state = 99u32;
        input.extend((0..20_000).map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (state >> 16) as u8
        }));
        input.extend(text(20_000));

        let encoded = encode_blocks(&input, 3, 20_000);
        assert_eq!(decode_blocks(&encoded, input.len()), input);
    }

    #[test]
    fn test_output_too_small() {
        let input = text(10_000);
        let mut compressor = BlockCompressor::new(CompressionParameters::compute(3, input.len()));
        let mut output = [0u8; 64];
        let err = compressor
            .write_block(&input, 0, input.len(), true, &mut output, 0)
            .unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { .. }));
    }
}
