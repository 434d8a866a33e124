//! Zstd compression pipeline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Input Data
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Parameters                         │
//! │  - Level and input size lookup      │
//! │  - Window sized to the input        │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Match Finding (double fast)        │
//! │  - Long (8-byte) and short tables   │
//! │  - Repeat offsets first             │
//! │  - Skip ahead on misses             │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Block Encoding                     │
//! │  - Literals (Raw/RLE/Huffman)       │
//! │  - Sequences (FSE/RLE/Repeat)       │
//! │  - Raw fallback when not worth it   │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Frame Assembly                     │
//! │  - Magic number                     │
//! │  - Frame header                     │
//! │  - Blocks                           │
//! │  - XXHash64 checksum                │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! - `parameters`: per-level tuning grid
//! - `match_finder`: double-fast LZ77 match finder
//! - `store`: sequences of one block and their codes
//! - `literals`: literals section encoder
//! - `sequences`: sequences section encoder
//! - `block`: block type selection and per-frame state

mod block;
mod literals;
mod match_finder;
mod parameters;
mod sequences;
mod store;

pub use block::BlockCompressor;
pub use literals::{encode_raw_literals, encode_rle_literals, minimum_gain, LiteralsEncoder};
pub use match_finder::{BlockCompressionState, OffsetHistory};
pub use parameters::{
    CompressionParameters, Strategy, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL, MAX_WINDOW_LOG,
};
pub use sequences::SequenceEncoder;
pub use store::{literal_length_code, match_length_code, SequenceStore, REP_MOVE};

use tessera_core::{Error, Result};
use tracing::debug;

use crate::bits::write_u32_le;
use crate::frame::{frame_checksum, write_magic, FrameHeader, CHECKSUM_SIZE, MAX_BLOCK_SIZE};

/// Largest output [`compress_frame`] can produce for `input_size` bytes.
pub fn max_compressed_length(input_size: usize) -> usize {
    let margin = if input_size < MAX_BLOCK_SIZE {
        (MAX_BLOCK_SIZE - input_size) >> 11
    } else {
        0
    };
    input_size + (input_size >> 8) + margin
}

/// Compression context for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressContext {
    level: i32,
}

impl Default for CompressContext {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl CompressContext {
    /// Create a context for a zstd level. Levels above 22 behave as 22,
    /// negative levels trade ratio for speed.
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Compress `input` into a new frame.
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; max_compressed_length(input.len())];
        let written = self.compress_to(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    /// Compress `input` into one frame at the start of `output`. Returns
    /// the frame size.
    pub fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        compress_frame(input, output, self.level)
    }
}

/// Compress `input` into one checksummed frame at the start of `output`.
/// Returns the frame size.
pub fn compress_frame(input: &[u8], output: &mut [u8], level: i32) -> Result<usize> {
    // Match finder tables hold 32-bit positions
    if input.len() > u32::MAX as usize {
        return Err(Error::invalid_argument("Input larger than 4 GiB"));
    }

    let parameters = CompressionParameters::compute(level, input.len());
    let mut position = write_magic(output)?;
    position += FrameHeader::write(&mut output[position..], input.len() as u64, parameters.window_log)?;

    let mut blocks = BlockCompressor::new(parameters);
    let block_size = MAX_BLOCK_SIZE.min(parameters.window_size());
    let mut start = 0;
    loop {
        let end = input.len().min(start + block_size);
        let last = end == input.len();
        position += blocks.write_block(input, start, end, last, output, position)?;
        start = end;
        if last {
            break;
        }
    }

    if position + CHECKSUM_SIZE > output.len() {
        return Err(Error::buffer_too_small(position + CHECKSUM_SIZE, output.len()));
    }
    write_u32_le(output, position, frame_checksum(input));
    position += CHECKSUM_SIZE;

    debug!(
        level,
        input = input.len(),
        output = position,
        window_log = parameters.window_log,
        strategy = ?parameters.strategy,
        "Frame compressed"
    );
    Ok(position)
}
