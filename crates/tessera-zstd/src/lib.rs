//! # Tessera Zstd
//!
//! Bounds-checked Zstandard (RFC 8878) codec in safe Rust.
//!
//! Frames produced here decode with the reference zstd library, and frames
//! produced by it decode here, within the supported limits: no
//! dictionaries, windows up to 8 MiB.
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera_zstd::{ZstdCodec, ZstdCompressor};
//! use tessera_core::{Compressor, Decompressor, CompressionLevel};
//!
//! // One value for both directions
//! let codec = ZstdCodec::new();
//! let compressed = codec.compress(b"Hello, World!").unwrap();
//! let original = codec.decompress(&compressed).unwrap();
//! assert_eq!(original, b"Hello, World!");
//!
//! // A specific level
//! let compressor = ZstdCompressor::with_level(CompressionLevel::Best);
//! let compressed = compressor.compress(b"test data").unwrap();
//! ```
//!
//! Caller-owned buffers work through the free functions:
//!
//! ```rust
//! let input = b"abcabcabcabcabcabcabcabc";
//! let mut frame = vec![0u8; tessera_zstd::max_compressed_length(input.len())];
//! let size = tessera_zstd::compress(input, &mut frame).unwrap();
//!
//! assert_eq!(tessera_zstd::get_decompressed_size(&frame[..size]).unwrap(), Some(24));
//! let mut output = [0u8; 24];
//! assert_eq!(tessera_zstd::decompress(&frame[..size], &mut output).unwrap(), 24);
//! assert_eq!(&output, input);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tessera-zstd                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  compress/              │  decompress.rs                    │
//! │  ├── parameters.rs      │  (frames, blocks, checksum)       │
//! │  ├── match_finder.rs    │                                   │
//! │  ├── literals.rs        │                                   │
//! │  ├── sequences.rs       │                                   │
//! │  └── block.rs           │                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  huffman/               │  fse/                             │
//! │  ├── encoder.rs         │  ├── encoder.rs                   │
//! │  ├── decoder.rs         │  ├── normalize.rs                 │
//! │  └── table.rs           │  ├── header.rs                    │
//! │                         │  └── table.rs                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  frame/                 │  block/                           │
//! │  ├── header.rs          │  ├── literals.rs                  │
//! │  ├── block.rs           │  └── sequences.rs                 │
//! │  └── checksum.rs        │                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  bits/ (reader, writer)  ·  histogram.rs                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Logging
//!
//! Frame-level events are emitted with `tracing::debug!`, block-level
//! decisions with `tracing::trace!`. The crate never installs a
//! subscriber.
//!
//! ## References
//!
//! - [RFC 8878 - Zstandard Compression](https://datatracker.ietf.org/doc/html/rfc8878)
//! - [Zstd Format Specification](https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md)

pub mod bits;
pub mod block;
pub mod compress;
pub mod decompress;
pub mod frame;
pub mod fse;
pub mod histogram;
pub mod huffman;

use std::fs;
use std::path::Path;

use tessera_core::{Codec, CompressionLevel, Compressor, Decompressor, Result};
use tracing::debug;

pub use compress::max_compressed_length;
pub use decompress::get_decompressed_size;
pub use frame::ZSTD_MAGIC;

/// Compress `input` into `output` at the default level. Returns the frame
/// size.
pub fn compress(input: &[u8], output: &mut [u8]) -> Result<usize> {
    compress::compress_frame(input, output, tessera_core::DEFAULT_LEVEL)
}

/// Compress `input` into `output` at a zstd `level`. Returns the frame
/// size.
pub fn compress_with_level(input: &[u8], output: &mut [u8], level: CompressionLevel) -> Result<usize> {
    compress::compress_frame(input, output, level.validate()?)
}

/// Decompress every frame of `input` into `output`. Returns the bytes
/// written.
pub fn decompress(input: &[u8], output: &mut [u8]) -> Result<usize> {
    decompress::FrameDecompressor::new().decompress_to(input, output)
}

/// Compress the file at `source` into `destination`. Returns the bytes
/// written.
pub fn compress_file(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<usize> {
    let input = fs::read(source.as_ref())?;
    let compressed = ZstdCompressor::new().compress(&input)?;
    fs::write(destination.as_ref(), &compressed)?;
    debug!(
        source = %source.as_ref().display(),
        input = input.len(),
        output = compressed.len(),
        "File compressed"
    );
    Ok(compressed.len())
}

/// Decompress the file at `source` into `destination`. Returns the bytes
/// written.
pub fn decompress_file(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<usize> {
    let input = fs::read(source.as_ref())?;
    let decompressed = ZstdDecompressor::new().decompress(&input)?;
    fs::write(destination.as_ref(), &decompressed)?;
    debug!(
        source = %source.as_ref().display(),
        input = input.len(),
        output = decompressed.len(),
        "File decompressed"
    );
    Ok(decompressed.len())
}

/// Zstandard compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZstdCompressor {
    level: CompressionLevel,
}

impl ZstdCompressor {
    /// Compressor at level 3.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compressor at `level`. The level is validated on each call.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self { level }
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn level(&self) -> CompressionLevel {
        self.level
    }

    fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        compress_with_level(input, output, self.level)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        max_compressed_length(input_len)
    }
}

/// Zstandard decompressor. Holds no state between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZstdDecompressor;

impl ZstdDecompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Decompressor for ZstdDecompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        decompress::FrameDecompressor::new().decompress(input)
    }

    fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        decompress(input, output)
    }
}

/// Compressor and decompressor in one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZstdCodec {
    compressor: ZstdCompressor,
}

impl ZstdCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: CompressionLevel) -> Self {
        Self {
            compressor: ZstdCompressor::with_level(level),
        }
    }
}

impl Compressor for ZstdCodec {
    fn name(&self) -> &'static str {
        self.compressor.name()
    }

    fn level(&self) -> CompressionLevel {
        self.compressor.level()
    }

    fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.compressor.compress_to(input, output)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        self.compressor.max_compressed_size(input_len)
    }
}

impl Decompressor for ZstdCodec {
    fn name(&self) -> &'static str {
        ZstdDecompressor.name()
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        ZstdDecompressor.decompress(input)
    }

    fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        ZstdDecompressor.decompress_to(input, output)
    }
}

impl Codec for ZstdCodec {
    fn new() -> Self {
        ZstdCodec::new()
    }

    fn with_level(level: CompressionLevel) -> Self {
        ZstdCodec::with_level(level)
    }
}
