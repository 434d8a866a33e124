//! Codec traits.
//!
//! Every operation works on whole buffers the caller owns. Implementations
//! keep no reference to either buffer once a call returns.
//!
//! ```text
//! Compressor    Decompressor
//!      \           /
//!        Codec
//! ```

use crate::error::Result;
use crate::types::{CompressionLevel, CompressionRatio};

/// Turns a buffer into one compressed frame.
pub trait Compressor {
    /// Format name, e.g. `"zstd"`.
    fn name(&self) -> &'static str;

    /// Level frames are written at.
    fn level(&self) -> CompressionLevel;

    /// Compress `input` into a new vector sized by
    /// [`max_compressed_size`](Self::max_compressed_size).
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; self.max_compressed_size(input.len())];
        let written = self.compress_to(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    /// Compress `input` into the start of `output` and return the frame
    /// size.
    ///
    /// Fails with [`Error::BufferTooSmall`](crate::Error::BufferTooSmall)
    /// when the frame does not fit; the contents of `output` are then
    /// unspecified.
    fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Upper bound on the frame size for `input_len` bytes. An output
    /// buffer this large never makes [`compress_to`](Self::compress_to)
    /// fail.
    fn max_compressed_size(&self, input_len: usize) -> usize;
}

/// Turns compressed frames back into their content.
pub trait Decompressor {
    /// Format name, e.g. `"zstd"`.
    fn name(&self) -> &'static str;

    /// Decode every frame in `input` into a new vector.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decode every frame in `input` into `output` and return the bytes
    /// written.
    ///
    /// Malformed input is reported through
    /// [`Error::is_malformed`](crate::Error::is_malformed); an `output`
    /// too short for the content yields
    /// [`Error::BufferTooSmall`](crate::Error::BufferTooSmall).
    fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Decode into a vector of `output_size` bytes, truncated to what was
    /// written.
    fn decompress_with_size(&self, input: &[u8], output_size: usize) -> Result<Vec<u8>> {
        let mut output = vec![0u8; output_size];
        let written = self.decompress_to(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }
}

/// Both directions of one format.
pub trait Codec: Compressor + Decompressor {
    /// Codec at the default level.
    fn new() -> Self
    where
        Self: Sized;

    /// Codec writing frames at `level`.
    fn with_level(level: CompressionLevel) -> Self
    where
        Self: Sized;

    /// Whether `data` survives compression followed by decompression.
    fn verify_roundtrip(&self, data: &[u8]) -> Result<bool> {
        let compressed = self.compress(data)?;
        let decompressed = self.decompress(&compressed)?;
        Ok(data == decompressed.as_slice())
    }

    /// Size of `data` before and after compression.
    fn measure_ratio(&self, data: &[u8]) -> Result<CompressionRatio> {
        let compressed = self.compress(data)?;
        Ok(CompressionRatio::new(data.len(), compressed.len()))
    }
}
