//! Forward bit writer.

use tessera_core::{Error, Result};

use super::bit_mask;

/// Accumulates bits in a 64-bit container and drains whole bytes to a
/// caller-supplied region.
///
/// Every flush stores the full container, so the writer keeps 8 bytes of
/// slack at the end of the region; [`close`](Self::close) reports an
/// overflow when the data reached that slack.
#[derive(Debug)]
pub struct BitWriter<'a> {
    output: &'a mut [u8],
    limit: usize,
    current: usize,
    container: u64,
    bit_count: u32,
}

impl<'a> BitWriter<'a> {
    /// Create a writer over `output`, which must hold at least 8 bytes.
    pub fn new(output: &'a mut [u8]) -> Result<Self> {
        if output.len() < 8 {
            return Err(Error::buffer_too_small(8, output.len()));
        }
        let limit = output.len() - 8;
        Ok(Self {
            output,
            limit,
            current: 0,
            container: 0,
            bit_count: 0,
        })
    }

    /// Append the low `bits` bits of `value`.
    #[inline]
    pub fn add_bits(&mut self, value: u64, bits: u32) {
        self.container |= (value & bit_mask(bits)) << self.bit_count;
        self.bit_count += bits;
    }

    /// Append `value`, which must not have bits set above `bits`.
    #[inline]
    pub fn add_bits_fast(&mut self, value: u64, bits: u32) {
        debug_assert!(bits == 64 || value >> bits == 0);
        self.container |= value << self.bit_count;
        self.bit_count += bits;
    }

    /// Drain complete bytes, keeping the remaining `bit_count & 7` bits.
    #[inline]
    pub fn flush(&mut self) {
        let bytes = (self.bit_count >> 3) as usize;
        self.output[self.current..self.current + 8].copy_from_slice(&self.container.to_le_bytes());
        self.current += bytes;
        if self.current > self.limit {
            self.current = self.limit;
        }
        self.bit_count &= 7;
        self.container = self.container.checked_shr(bytes as u32 * 8).unwrap_or(0);
    }

    /// Append the end mark, flush, and return the stream size in bytes.
    pub fn close(mut self) -> Result<usize> {
        self.add_bits_fast(1, 1);
        self.flush();
        if self.current >= self.limit {
            return Err(Error::buffer_too_small(
                self.output.len() + 1,
                self.output.len(),
            ));
        }
        Ok(self.current + usize::from(self.bit_count > 0))
    }

    /// Bits pending in the container.
    #[inline]
    pub fn pending_bits(&self) -> u32 {
        self.bit_count
    }
}
