//! Frame headers.
//!
//! ```text
//! descriptor byte:
//!   bits 7-6  Frame_Content_Size_flag (0/2/4/8 bytes; 1 byte if single segment)
//!   bit  5    Single_Segment_flag (no window descriptor)
//!   bit  3    Reserved (must be 0)
//!   bit  2    Content_Checksum_flag
//!   bits 1-0  Dictionary_ID_flag (0/1/2/4 bytes)
//! ```

use tessera_core::{Error, Result};

use super::{MAX_FRAME_HEADER_SIZE, MIN_WINDOW_LOG};
use crate::bits::{read_u16_le, read_u32_le, read_u64_le, write_u16_le, write_u32_le};

const SINGLE_SEGMENT_FLAG: u8 = 0x20;
const RESERVED_BIT: u8 = 0x08;
const CHECKSUM_FLAG: u8 = 0x04;

/// A parsed frame header (everything between the magic and the first
/// block).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Header size in bytes, magic excluded.
    pub header_size: usize,
    /// Window size from the window descriptor; `None` for single-segment
    /// frames, whose window is the content itself.
    pub window_size: Option<u64>,
    /// Declared decompressed size.
    pub content_size: Option<u64>,
    /// Whether a 4-byte checksum follows the last block.
    pub has_checksum: bool,
}

impl FrameHeader {
    /// Parse the header at the start of `input`.
    ///
    /// A present dictionary id of 0 means "no dictionary"; any other id is
    /// unsupported.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let Some(&descriptor) = input.first() else {
            return Err(Error::corrupted("Not enough input bytes"));
        };
        if descriptor & RESERVED_BIT != 0 {
            return Err(Error::corrupted_at("Reserved frame header bit set", 0));
        }

        let single_segment = descriptor & SINGLE_SEGMENT_FLAG != 0;
        let dictionary_descriptor = descriptor & 0x3;
        let content_size_descriptor = descriptor >> 6;

        let dictionary_id_size = match dictionary_descriptor {
            0 => 0,
            flag => 1 << (flag - 1),
        };
        let content_size_size = match content_size_descriptor {
            0 => usize::from(single_segment),
            flag => 1 << flag,
        };
        let header_size = 1 + usize::from(!single_segment) + dictionary_id_size + content_size_size;
        if header_size > input.len() {
            return Err(Error::corrupted("Not enough input bytes"));
        }

        let mut position = 1;
        let window_size = if single_segment {
            None
        } else {
            let window_descriptor = input[position];
            position += 1;
            let exponent = (window_descriptor >> 3) as u32;
            let mantissa = (window_descriptor & 0x7) as u64;
            let base = 1u64 << (MIN_WINDOW_LOG + exponent);
            Some(base + (base / 8) * mantissa)
        };

        let dictionary_id = match dictionary_id_size {
            0 => 0,
            1 => input[position] as u32,
            2 => read_u16_le(input, position) as u32,
            _ => read_u32_le(input, position),
        };
        position += dictionary_id_size;
        if dictionary_id != 0 {
            return Err(Error::unsupported("Custom dictionaries not supported"));
        }

        let content_size = match content_size_size {
            0 => None,
            1 => Some(input[position] as u64),
            2 => Some(read_u16_le(input, position) as u64 + 256),
            4 => Some(read_u32_le(input, position) as u64),
            _ => Some(read_u64_le(input, position)),
        };

        Ok(Self {
            header_size,
            window_size,
            content_size,
            has_checksum: descriptor & CHECKSUM_FLAG != 0,
        })
    }

    /// Write the header for `content_size` bytes compressed with a
    /// `1 << window_log` window, checksum enabled. Returns its size.
    pub fn write(output: &mut [u8], content_size: u64, window_log: u32) -> Result<usize> {
        if output.len() < MAX_FRAME_HEADER_SIZE {
            return Err(Error::buffer_too_small(MAX_FRAME_HEADER_SIZE, output.len()));
        }
        if window_log < MIN_WINDOW_LOG {
            return Err(Error::invalid_argument(format!(
                "Minimum window size is {}",
                1u64 << MIN_WINDOW_LOG
            )));
        }

        let content_size_descriptor: u8 = match content_size {
            0..=255 => 0,
            256..=65_791 => 1,
            65_792..=0xFFFF_FFFF => 2,
            _ => 3,
        };
        let single_segment = 1u64 << window_log >= content_size;

        let mut descriptor = content_size_descriptor << 6 | CHECKSUM_FLAG;
        if single_segment {
            descriptor |= SINGLE_SEGMENT_FLAG;
        }
        output[0] = descriptor;
        let mut position = 1;

        if !single_segment {
            output[position] = ((window_log - MIN_WINDOW_LOG) << 3) as u8;
            position += 1;
        }

        match content_size_descriptor {
            0 => {
                if single_segment {
                    output[position] = content_size as u8;
                    position += 1;
                }
            }
            1 => {
                write_u16_le(output, position, (content_size - 256) as u16);
                position += 2;
            }
            2 => {
                write_u32_le(output, position, content_size as u32);
                position += 4;
            }
            _ => {
                output[position..position + 8].copy_from_slice(&content_size.to_le_bytes());
                position += 8;
            }
        }

        Ok(position)
    }
}
