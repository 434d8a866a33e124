//! Literals section decoding.
//!
//! ```text
//! byte 0:
//!   bits 1-0  Literals_Block_Type
//!   bits 3-2  Size_Format
//!
//! raw / RLE:      1, 2 or 3 header bytes, regenerated size only
//! compressed:     3, 4 or 5 header bytes, regenerated + compressed sizes
//! ```

use tessera_core::{Error, Result};

use crate::bits::{read_u16_le, read_u24_le, read_u32_le};
use crate::frame::MAX_BLOCK_SIZE;
use crate::huffman::HuffmanDecoder;

/// How the literals of a block are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsBlockType {
    /// Stored bytes.
    Raw = 0,
    /// One byte repeated.
    Rle = 1,
    /// Huffman-coded with a table carried in the section.
    Compressed = 2,
    /// Huffman-coded with the table of a previous block.
    Treeless = 3,
}

impl LiteralsBlockType {
    /// Parse the 2-bit type field.
    pub fn from_field(field: u8) -> Self {
        match field & 0x3 {
            0 => Self::Raw,
            1 => Self::Rle,
            2 => Self::Compressed,
            _ => Self::Treeless,
        }
    }
}

/// Decodes literals sections into an owned buffer.
///
/// The Huffman table read by a compressed section stays loaded for the
/// treeless sections that follow it in the same frame.
#[derive(Debug, Clone)]
pub struct LiteralsDecoder {
    huffman: HuffmanDecoder,
    buffer: Vec<u8>,
    size: usize,
}

impl Default for LiteralsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LiteralsDecoder {
    pub fn new() -> Self {
        Self {
            huffman: HuffmanDecoder::new(),
            buffer: vec![0; MAX_BLOCK_SIZE],
            size: 0,
        }
    }

    /// Drop the Huffman table carried over from earlier blocks.
    pub fn reset(&mut self) {
        self.huffman.reset();
        self.size = 0;
    }

    /// Literals produced by the last [`decode`](Self::decode).
    pub fn literals(&self) -> &[u8] {
        &self.buffer[..self.size]
    }

    /// Decode the literals section at the start of `block`.
    ///
    /// Returns the number of bytes the section occupies.
    pub fn decode(&mut self, block: &[u8]) -> Result<usize> {
        let Some(&first) = block.first() else {
            return Err(Error::corrupted("Not enough input bytes"));
        };

        match LiteralsBlockType::from_field(first) {
            LiteralsBlockType::Raw => self.decode_raw(block),
            LiteralsBlockType::Rle => self.decode_rle(block),
            LiteralsBlockType::Compressed => self.decode_compressed(block, false),
            LiteralsBlockType::Treeless => {
                if !self.huffman.is_loaded() {
                    return Err(Error::corrupted("Treeless literals without a previous Huffman table"));
                }
                self.decode_compressed(block, true)
            }
        }
    }

    fn decode_raw(&mut self, block: &[u8]) -> Result<usize> {
        let (header_size, size) = regenerated_size(block)?;
        let end = header_size + size;
        if end > block.len() {
            return Err(Error::corrupted_at("Not enough input bytes", header_size));
        }
        if size > MAX_BLOCK_SIZE {
            return Err(Error::corrupted("Literals exceed maximum block size"));
        }

        self.buffer[..size].copy_from_slice(&block[header_size..end]);
        self.size = size;
        Ok(end)
    }

    fn decode_rle(&mut self, block: &[u8]) -> Result<usize> {
        let (header_size, size) = regenerated_size(block)?;
        let Some(&value) = block.get(header_size) else {
            return Err(Error::corrupted_at("Not enough input bytes", header_size));
        };
        if size > MAX_BLOCK_SIZE {
            return Err(Error::corrupted("Output exceeds maximum block size"));
        }

        self.buffer[..size].fill(value);
        self.size = size;
        Ok(header_size + 1)
    }

    fn decode_compressed(&mut self, block: &[u8], treeless: bool) -> Result<usize> {
        if block.len() < 5 {
            return Err(Error::corrupted("Not enough input bytes"));
        }

        let (header_size, single_stream, regenerated, compressed) = match (block[0] >> 2) & 0x3 {
            format @ (0 | 1) => {
                let header = read_u32_le(block, 0);
                (3, format == 0, (header >> 4) & 0x3FF, (header >> 14) & 0x3FF)
            }
            2 => {
                let header = read_u32_le(block, 0);
                (4, false, (header >> 4) & 0x3FFF, (header >> 18) & 0x3FFF)
            }
            _ => {
                let header = block[0] as u64 | (read_u32_le(block, 1) as u64) << 8;
                (5, false, ((header >> 4) & 0x3FFFF) as u32, ((header >> 22) & 0x3FFFF) as u32)
            }
        };
        let regenerated = regenerated as usize;
        let compressed = compressed as usize;

        if regenerated > MAX_BLOCK_SIZE {
            return Err(Error::corrupted("Block exceeds maximum size"));
        }
        let end = header_size + compressed;
        if end > block.len() {
            return Err(Error::corrupted_at("Input is corrupted", header_size));
        }

        let mut payload = &block[header_size..end];
        if !treeless {
            let table_size = self.huffman.read_table(payload)?;
            payload = &payload[table_size..];
        }

        let output = &mut self.buffer[..regenerated];
        if single_stream {
            self.huffman.decode_single_stream(payload, output)?;
        } else {
            self.huffman.decode_4_streams(payload, output)?;
        }
        self.size = regenerated;
        Ok(end)
    }
}

/// Header size and regenerated size of a raw or RLE literals section.
fn regenerated_size(block: &[u8]) -> Result<(usize, usize)> {
    let first = block[0];
    let (header_size, size) = match (first >> 2) & 0x3 {
        0 | 2 => (1, (first >> 3) as usize),
        1 => {
            if block.len() < 2 {
                return Err(Error::corrupted("Not enough input bytes"));
            }
            (2, (read_u16_le(block, 0) >> 4) as usize)
        }
        _ => {
            if block.len() < 3 {
                return Err(Error::corrupted("Not enough input bytes"));
            }
            (3, (read_u24_le(block, 0) >> 4) as usize)
        }
    };
    Ok((header_size, size))
}
