//! Full Zstd decompression pipeline.
//!
//! Frames are decoded back to back until the input is exhausted. Each
//! frame starts from fresh decoder state: the Huffman table, the sequence
//! tables and the repeat offsets from a previous frame are never used.

use tessera_core::{Error, Result};
use tracing::{debug, trace};

use crate::bits::read_u32_le;
use crate::block::{decode_raw_block, decode_rle_block, BlockDecoder};
use crate::frame::{
    frame_checksum, verify_magic, BlockHeader, BlockType, FrameHeader, CHECKSUM_SIZE, MAX_BLOCK_SIZE,
};

/// Where decoded bytes go: a caller buffer of fixed size, or a vector
/// grown as blocks arrive.
enum Sink<'a> {
    Slice(&'a mut [u8]),
    Vec(&'a mut Vec<u8>),
}

impl Sink<'_> {
    /// Make `..end` addressable. Fixed buffers stay as they are; writers
    /// report their overflow.
    fn prepare(&mut self, end: usize) {
        if let Sink::Vec(output) = self {
            if output.len() < end {
                output.resize(end, 0);
            }
        }
    }

    fn buffer(&mut self) -> &mut [u8] {
        match self {
            Sink::Slice(output) => output,
            Sink::Vec(output) => output.as_mut_slice(),
        }
    }
}

/// Decoder for a sequence of frames.
#[derive(Debug, Clone, Default)]
pub struct FrameDecompressor {
    blocks: BlockDecoder,
}

impl FrameDecompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every frame of `input` into `output`. Returns the bytes
    /// written.
    pub fn decompress_to(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.run(input, Sink::Slice(output))
    }

    /// Decode every frame of `input` into a new vector.
    pub fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let written = self.run(input, Sink::Vec(&mut output))?;
        output.truncate(written);
        Ok(output)
    }

    fn run(&mut self, input: &[u8], mut sink: Sink<'_>) -> Result<usize> {
        let mut consumed = 0;
        let mut position = 0;
        while consumed < input.len() {
            let (used, written) = self.decode_frame(&input[consumed..], &mut sink, position)?;
            consumed += used;
            position += written;
        }
        Ok(position)
    }

    /// Decode the frame at the start of `input` to the sink, starting at
    /// `frame_start`. Returns the input consumed and the bytes written.
    ///
    /// Corruption offsets are relative to the start of the frame.
    fn decode_frame(&mut self, input: &[u8], sink: &mut Sink<'_>, frame_start: usize) -> Result<(usize, usize)> {
        let mut consumed = verify_magic(input)?;
        let header = FrameHeader::parse(&input[consumed..])?;
        consumed += header.header_size;
        debug!(
            header_size = header.header_size,
            window_size = ?header.window_size,
            content_size = ?header.content_size,
            has_checksum = header.has_checksum,
            "Frame header"
        );

        self.blocks.reset();

        if let Some(content_size) = header.content_size {
            match sink {
                Sink::Slice(output) => {
                    let end = (frame_start as u64).saturating_add(content_size);
                    if end > output.len() as u64 {
                        return Err(Error::buffer_too_small(
                            usize::try_from(end).unwrap_or(usize::MAX),
                            output.len(),
                        ));
                    }
                }
                Sink::Vec(output) => {
                    // Each block costs at least 4 input bytes, so a larger
                    // declaration cannot be honest; reserve no more than that
                    let plausible = ((input.len() - consumed) / 4 + 1) * MAX_BLOCK_SIZE;
                    let reserve = usize::try_from(content_size).unwrap_or(usize::MAX).min(plausible);
                    output.reserve(reserve);
                }
            }
        }

        let mut position = frame_start;
        loop {
            let block = BlockHeader::parse(&input[consumed..])?;
            if block.size > MAX_BLOCK_SIZE {
                return Err(Error::corrupted_at("Block exceeds maximum size", consumed));
            }
            consumed += BlockHeader::SIZE;

            let payload_size = block.payload_size();
            if consumed + payload_size > input.len() {
                return Err(Error::corrupted_at("Not enough input bytes", consumed));
            }
            let payload = &input[consumed..consumed + payload_size];

            let written = match block.block_type {
                BlockType::Raw => {
                    sink.prepare(position + payload_size);
                    decode_raw_block(payload, sink.buffer(), position)?
                }
                BlockType::Rle => {
                    sink.prepare(position + block.size);
                    decode_rle_block(payload[0], block.size, sink.buffer(), position)?
                }
                BlockType::Compressed => {
                    sink.prepare(position + MAX_BLOCK_SIZE);
                    self.blocks.decode_compressed_block(
                        payload,
                        sink.buffer(),
                        frame_start,
                        position,
                        header.window_size,
                    )?
                }
            };
            trace!(block_type = ?block.block_type, size = payload_size, written, last = block.last, "Block");

            consumed += payload_size;
            position += written;
            if block.last {
                break;
            }
        }

        let written = position - frame_start;
        if let Some(content_size) = header.content_size {
            if content_size != written as u64 {
                return Err(Error::corrupted(format!(
                    "Content size mismatch: declared {content_size}, decoded {written}"
                )));
            }
        }

        if header.has_checksum {
            if consumed + CHECKSUM_SIZE > input.len() {
                return Err(Error::corrupted_at("Not enough input bytes for checksum", consumed));
            }
            let stored = read_u32_le(input, consumed);
            let actual = frame_checksum(&sink.buffer()[frame_start..position]);
            if stored != actual {
                return Err(Error::checksum_mismatch(stored, actual));
            }
            consumed += CHECKSUM_SIZE;
        }

        Ok((consumed, written))
    }
}

/// Decompress every frame of `input` into a new vector.
pub fn decompress_frame(input: &[u8]) -> Result<Vec<u8>> {
    FrameDecompressor::new().decompress(input)
}

/// Content size declared by the first frame of `input`, or `None` when
/// the frame does not record it.
pub fn get_decompressed_size(input: &[u8]) -> Result<Option<u64>> {
    let consumed = verify_magic(input)?;
    Ok(FrameHeader::parse(&input[consumed..])?.content_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{xxhash64, MAGIC_SIZE};

    const MAGIC: [u8; MAGIC_SIZE] = [0x28, 0xB5, 0x2F, 0xFD];

    /// Single-segment frame with a 1-byte content size.
    fn frame(descriptor: u8, content_size: u8, body: &[u8]) -> Vec<u8> {
        let mut frame = MAGIC.to_vec();
        frame.push(descriptor);
        frame.push(content_size);
        frame.extend_from_slice(body);
        frame
    }

    fn block_header(last: bool, block_type: BlockType, size: usize) -> [u8; 3] {
        let mut header = [0u8; 3];
        BlockHeader::new(last, block_type, size).write(&mut header, 0).unwrap();
        header
    }

    #[test]
    fn test_magic_validation() {
        assert!(decompress_frame(&[0x00, 0x00, 0x00, 0x00]).is_err());
        assert!(decompress_frame(&[0x28, 0xB5]).is_err());
        // Valid magic, truncated header
        assert!(decompress_frame(&[0x28, 0xB5, 0x2F, 0xFD]).is_err());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decompress_frame(&[]).unwrap(), Vec::<u8>::new());
        let mut output = [0u8; 4];
        assert_eq!(FrameDecompressor::new().decompress_to(&[], &mut output).unwrap(), 0);
    }

    #[test]
    fn test_simple_raw_frame() {
        // Single segment, 1-byte content size, no checksum
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        assert_eq!(decompress_frame(&frame(0x20, 5, &body)).unwrap(), b"Hello");
    }

    #[test]
    fn test_rle_frame() {
        let mut body = block_header(true, BlockType::Rle, 10).to_vec();
        body.push(b'X');
        assert_eq!(decompress_frame(&frame(0x20, 10, &body)).unwrap(), vec![b'X'; 10]);
    }

    #[test]
    fn test_multi_block_frame() {
        let mut body = block_header(false, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        body.extend_from_slice(&block_header(true, BlockType::Raw, 3));
        body.extend_from_slice(b"!!!");
        assert_eq!(decompress_frame(&frame(0x20, 8, &body)).unwrap(), b"Hello!!!");
    }

    #[test]
    fn test_content_size_mismatch() {
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        let err = decompress_frame(&frame(0x20, 10, &body)).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_frame_with_checksum() {
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        body.extend_from_slice(&(xxhash64(b"Hello", 0) as u32).to_le_bytes());
        assert_eq!(decompress_frame(&frame(0x24, 5, &body)).unwrap(), b"Hello");
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        body.extend_from_slice(&[0, 0, 0, 0]);
        let err = decompress_frame(&frame(0x24, 5, &body)).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { expected: 0, .. }));
    }

    #[test]
    fn test_missing_checksum() {
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        body.extend_from_slice(&[0, 0]);
        assert!(decompress_frame(&frame(0x24, 5, &body)).unwrap_err().is_malformed());
    }

    #[test]
    fn test_compressed_block_literals_only() {
        // Raw literals section (1-byte header), zero sequences
        let mut block = vec![5 << 3];
        block.extend_from_slice(b"Hello");
        block.push(0);

        let mut body = block_header(true, BlockType::Compressed, block.len()).to_vec();
        body.extend_from_slice(&block);
        assert_eq!(decompress_frame(&frame(0x20, 5, &body)).unwrap(), b"Hello");
    }

    #[test]
    fn test_oversized_block_rejected() {
        let body = block_header(true, BlockType::Raw, MAX_BLOCK_SIZE + 1);
        let err = decompress_frame(&frame(0x20, 0, &body)).unwrap_err();
        assert!(matches!(err, Error::CorruptedData { offset: Some(6), .. }));
    }

    #[test]
    fn test_truncated_block() {
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hel");
        assert!(decompress_frame(&frame(0x20, 5, &body)).unwrap_err().is_malformed());
    }

    #[test]
    fn test_concatenated_frames() {
        let mut first = block_header(true, BlockType::Raw, 3).to_vec();
        first.extend_from_slice(b"abc");
        let mut second = block_header(true, BlockType::Rle, 4).to_vec();
        second.push(b'z');

        let mut input = frame(0x20, 3, &first);
        input.extend_from_slice(&frame(0x20, 4, &second));
        assert_eq!(decompress_frame(&input).unwrap(), b"abczzzz");

        // Trailing garbage is not a frame
        input.push(0);
        assert!(decompress_frame(&input).is_err());
    }

    #[test]
    fn test_output_slice_too_small() {
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        let mut output = [0u8; 4];
        let err = FrameDecompressor::new()
            .decompress_to(&frame(0x20, 5, &body), &mut output)
            .unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { required: 5, provided: 4 }));
    }

    #[test]
    fn test_unknown_size_grows_vector() {
        // Window descriptor, no content size
        let mut input = MAGIC.to_vec();
        input.push(0x00);
        input.push(0x00);
        for _ in 0..3 {
            input.extend_from_slice(&block_header(false, BlockType::Rle, MAX_BLOCK_SIZE));
            input.push(b'q');
        }
        input.extend_from_slice(&block_header(true, BlockType::Raw, 2));
        input.extend_from_slice(b"!!");

        let output = decompress_frame(&input).unwrap();
        assert_eq!(output.len(), 3 * MAX_BLOCK_SIZE + 2);
        assert!(output[..3 * MAX_BLOCK_SIZE].iter().all(|&byte| byte == b'q'));
        assert_eq!(get_decompressed_size(&input).unwrap(), None);
    }

    #[test]
    fn test_get_decompressed_size() {
        let mut body = block_header(true, BlockType::Raw, 5).to_vec();
        body.extend_from_slice(b"Hello");
        assert_eq!(get_decompressed_size(&frame(0x20, 5, &body)).unwrap(), Some(5));
        assert!(get_decompressed_size(b"nope").is_err());
    }
}
