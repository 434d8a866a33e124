//! Little-endian bit packing primitives.
//!
//! Zstandard entropy streams are written forwards and read backwards: the
//! writer appends bits above the ones already pending and closes the stream
//! with a single `1` marker bit, the reader starts from the last byte, skips
//! the padding and the marker, and consumes bits from the top of a 64-bit
//! container.
//!
//! ```text
//!  byte 0 ... byte n-1
//! [ first bits written ... last bits written | 1 | 0-padding ]
//!                                              ^ end mark
//! ```

mod reader;
mod writer;

pub use reader::BitReader;
pub use writer::BitWriter;

/// Index of the highest set bit. `value` must be non-zero.
#[inline]
pub const fn highest_bit(value: u32) -> u32 {
    31 - value.leading_zeros()
}

/// Return the next `n` bits of `container` after skipping `consumed` bits
/// from the top.
///
/// Pure function; `n == 0` always yields 0, and a fully consumed container
/// yields 0 rather than wrapping around.
#[inline]
pub fn peek_bits(consumed: u32, container: u64, n: u32) -> u64 {
    match container.checked_shl(consumed) {
        Some(shifted) => (shifted >> 1) >> (63 - n),
        None => 0,
    }
}

/// Variant of [`peek_bits`] for `n >= 1`, saving one shift.
#[inline]
pub fn peek_bits_fast(consumed: u32, container: u64, n: u32) -> u64 {
    debug_assert!(n > 0);
    match container.checked_shl(consumed) {
        Some(shifted) => shifted >> (64 - n),
        None => 0,
    }
}

/// Mask keeping the low `bits` bits.
#[inline]
pub(crate) fn bit_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

// =============================================================================
// Little-endian helpers
// =============================================================================

#[inline]
pub(crate) fn read_u16_le(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

#[inline]
pub(crate) fn read_u24_le(data: &[u8], pos: usize) -> u32 {
    data[pos] as u32 | (data[pos + 1] as u32) << 8 | (data[pos + 2] as u32) << 16
}

#[inline]
pub(crate) fn read_u32_le(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

#[inline]
pub(crate) fn read_u64_le(data: &[u8], pos: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[pos..pos + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
pub(crate) fn write_u16_le(data: &mut [u8], pos: usize, value: u16) {
    data[pos..pos + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_u24_le(data: &mut [u8], pos: usize, value: u32) {
    data[pos..pos + 3].copy_from_slice(&value.to_le_bytes()[..3]);
}

#[inline]
pub(crate) fn write_u32_le(data: &mut [u8], pos: usize, value: u32) {
    data[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}
