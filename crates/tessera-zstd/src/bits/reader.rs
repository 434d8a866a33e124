//! Backward bit reader.

use tessera_core::{Error, Result};

use super::{highest_bit, peek_bits, peek_bits_fast, read_u64_le};

/// Reads a backward bitstream: the last byte holds the end mark, and the
/// stream is consumed from the end towards the first byte.
///
/// `bits_consumed` counts bits already used from the top of `container`.
/// It never exceeds 64 while the stream is well formed; a larger value
/// after [`refill`](Self::refill) means the caller read past the start of
/// the stream and is reported through [`is_overflow`](Self::is_overflow).
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    current: usize,
    container: u64,
    bits_consumed: u32,
    overflow: bool,
}

impl<'a> BitReader<'a> {
    /// Initialize a reader over a complete stream.
    ///
    /// Fails if the stream is empty or its last byte carries no end mark.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let Some(&last_byte) = data.last() else {
            return Err(Error::corrupted("Bitstream is empty"));
        };
        if last_byte == 0 {
            return Err(Error::corrupted_at(
                "Bitstream end mark not present",
                data.len(),
            ));
        }

        let mut bits_consumed = 8 - highest_bit(last_byte as u32);
        let (current, container) = if data.len() >= 8 {
            let current = data.len() - 8;
            (current, read_u64_le(data, current))
        } else {
            bits_consumed += (8 - data.len() as u32) * 8;
            (0, read_tail(data))
        };

        Ok(Self {
            data,
            current,
            container,
            bits_consumed,
            overflow: false,
        })
    }

    /// Reload the container so that at least 57 bits are available again,
    /// when the stream still has them.
    ///
    /// Returns `true` once the physical start of the stream has been
    /// reached (no further reload possible) or when more bits were consumed
    /// than the container held, in which case the overflow flag is set.
    pub fn refill(&mut self) -> bool {
        if self.bits_consumed > 64 {
            self.overflow = true;
            return true;
        }
        if self.current == 0 {
            return true;
        }

        let bytes = (self.bits_consumed >> 3) as usize;
        if self.current >= 8 {
            if bytes > 0 {
                self.current -= bytes;
                self.container = read_u64_le(self.data, self.current);
            }
            self.bits_consumed &= 7;
            false
        } else if self.current < bytes {
            let bytes = self.current;
            self.current = 0;
            self.bits_consumed -= bytes as u32 * 8;
            self.container = read_u64_le(self.data, 0);
            true
        } else {
            self.current -= bytes;
            self.bits_consumed -= bytes as u32 * 8;
            self.container = read_u64_le(self.data, self.current);
            false
        }
    }

    /// Whether a refill found more bits consumed than available.
    #[inline]
    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    /// Whether every bit of the stream has been consumed exactly.
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        self.current == 0 && self.bits_consumed == 64
    }

    /// Look at the next `n` bits without consuming them.
    #[inline]
    pub fn peek(&self, n: u32) -> u64 {
        peek_bits(self.bits_consumed, self.container, n)
    }

    /// Look at the next `n >= 1` bits without consuming them.
    #[inline]
    pub fn peek_fast(&self, n: u32) -> u64 {
        peek_bits_fast(self.bits_consumed, self.container, n)
    }

    /// Consume and return the next `n` bits.
    #[inline]
    pub fn read_bits(&mut self, n: u32) -> u64 {
        let value = self.peek(n);
        self.bits_consumed += n;
        value
    }

    /// Mark `n` bits as consumed.
    #[inline]
    pub fn skip_bits(&mut self, n: u32) {
        self.bits_consumed += n;
    }

    /// Bits used so far from the current container.
    #[inline]
    pub fn bits_consumed(&self) -> u32 {
        self.bits_consumed
    }
}

/// Assemble a container from a stream shorter than 8 bytes.
fn read_tail(data: &[u8]) -> u64 {
    data.iter()
        .enumerate()
        .fold(0u64, |bits, (i, &byte)| bits | (byte as u64) << (8 * i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream_rejected() {
        assert!(BitReader::new(&[]).is_err());
    }

    #[test]
    fn test_missing_end_mark_rejected() {
        assert!(BitReader::new(&[0x12, 0x00]).is_err());
    }

    #[test]
    fn test_single_byte_stream() {
        // Bits 0b101 followed by the end mark at bit 3
        let mut reader = BitReader::new(&[0b0000_1101]).unwrap();
        assert_eq!(reader.read_bits(3), 0b101);
        reader.refill();
        assert!(reader.is_end_of_stream());
    }

    #[test]
    fn test_end_mark_only() {
        let reader = BitReader::new(&[0x01]).unwrap();
        assert!(reader.is_end_of_stream());
    }

    #[test]
    fn test_long_stream_refills() {
        // 16 bytes of 0xFF followed by a byte holding only the end mark
        let mut data = vec![0xFFu8; 16];
        data.push(0x01);
        let mut reader = BitReader::new(&data).unwrap();
        let mut total = 0;
        while !reader.is_end_of_stream() {
            assert_eq!(reader.read_bits(8), 0xFF);
            total += 8;
            reader.refill();
            assert!(!reader.is_overflow());
        }
        assert_eq!(total, 128);
    }

    #[test]
    fn test_overflow_detected() {
        let mut reader = BitReader::new(&[0xAA, 0x01]).unwrap();
        reader.read_bits(8);
        reader.read_bits(8);
        assert!(reader.refill());
        assert!(reader.is_overflow());
    }
}
