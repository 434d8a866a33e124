//! Block headers.
//!
//! ```text
//! 24 bits, little-endian:
//!   bit 0      Last_Block
//!   bits 1-2   Block_Type
//!   bits 3-23  Block_Size
//! ```

use tessera_core::{Error, Result};

use crate::bits::{read_u24_le, write_u24_le};

/// Kind of data a block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Stored bytes.
    Raw = 0,
    /// One byte repeated `size` times.
    Rle = 1,
    /// Literals and sequences sections.
    Compressed = 2,
}

/// A parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub last: bool,
    pub block_type: BlockType,
    /// Content size for raw and RLE blocks, payload size for compressed ones.
    pub size: usize,
}

impl BlockHeader {
    /// Encoded header size.
    pub const SIZE: usize = 3;

    pub fn new(last: bool, block_type: BlockType, size: usize) -> Self {
        Self {
            last,
            block_type,
            size,
        }
    }

    /// Parse the header at the start of `input`.
    pub fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < Self::SIZE {
            return Err(Error::corrupted("Not enough input bytes"));
        }

        let header = read_u24_le(input, 0);
        let block_type = match (header >> 1) & 0x3 {
            0 => BlockType::Raw,
            1 => BlockType::Rle,
            2 => BlockType::Compressed,
            _ => return Err(Error::corrupted("Invalid block type")),
        };

        Ok(Self {
            last: header & 1 != 0,
            block_type,
            size: (header >> 3) as usize,
        })
    }

    /// Bytes the block occupies after its header.
    pub fn payload_size(&self) -> usize {
        match self.block_type {
            BlockType::Rle => 1,
            BlockType::Raw | BlockType::Compressed => self.size,
        }
    }

    /// Write the header at `position`.
    pub fn write(&self, output: &mut [u8], position: usize) -> Result<()> {
        if position + Self::SIZE > output.len() {
            return Err(Error::buffer_too_small(position + Self::SIZE, output.len()));
        }
        let header = self.last as u32 | (self.block_type as u32) << 1 | (self.size as u32) << 3;
        write_u24_le(output, position, header);
        Ok(())
    }
}
