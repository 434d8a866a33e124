//! Zstandard frame format.
//!
//! ## Frame Structure
//!
//! ```text
//! +-------------------+
//! | Magic_Number      | 4 bytes (0xFD2FB528)
//! +-------------------+
//! | Frame_Header      | 1-14 bytes
//! +-------------------+
//! | Data_Block(s)     | 3-byte header + payload each
//! +-------------------+
//! | Content_Checksum  | 0-4 bytes (optional)
//! +-------------------+
//! ```
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1)

mod block;
mod checksum;
mod header;

use tessera_core::{Error, Result};

use crate::bits::{read_u32_le, write_u32_le};

pub use block::{BlockHeader, BlockType};
pub use checksum::{frame_checksum, xxhash64};
pub use header::FrameHeader;

/// Zstd magic number (little-endian: 0xFD2FB528).
pub const ZSTD_MAGIC: u32 = 0xFD2F_B528;

/// Magic of the pre-1.0 v0.7 format.
pub const V07_MAGIC: u32 = 0xFD2F_B527;

/// Magic number size.
pub const MAGIC_SIZE: usize = 4;

/// Checksum trailer size.
pub const CHECKSUM_SIZE: usize = 4;

/// Largest frame header, magic excluded.
pub const MAX_FRAME_HEADER_SIZE: usize = 14;

/// Smallest window log a window descriptor can express.
pub const MIN_WINDOW_LOG: u32 = 10;

/// Largest window this codec decodes (8 MiB).
pub const MAX_WINDOW_SIZE: u64 = 1 << 23;

/// Largest block content.
pub const MAX_BLOCK_SIZE: usize = 128 * 1024;

/// Smallest compressed block: literals header plus sequences header.
pub const MIN_BLOCK_SIZE: usize = 2;

/// Check the magic at the start of `input`; returns its size.
pub fn verify_magic(input: &[u8]) -> Result<usize> {
    if input.len() < MAGIC_SIZE {
        return Err(Error::corrupted("Not enough input bytes"));
    }

    match read_u32_le(input, 0) {
        ZSTD_MAGIC => Ok(MAGIC_SIZE),
        V07_MAGIC => Err(Error::unsupported("Data encoded in unsupported ZSTD v0.7 format")),
        magic => Err(Error::corrupted_at(format!("Invalid magic prefix: {magic:#x}"), 0)),
    }
}

/// Write the magic at the start of `output`; returns its size.
pub fn write_magic(output: &mut [u8]) -> Result<usize> {
    if output.len() < MAGIC_SIZE {
        return Err(Error::buffer_too_small(MAGIC_SIZE, output.len()));
    }
    write_u32_le(output, 0, ZSTD_MAGIC);
    Ok(MAGIC_SIZE)
}
