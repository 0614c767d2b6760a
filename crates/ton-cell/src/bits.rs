//! Bounded bit buffer.
//!
//! All sub-byte packing goes through [`BitWriter`], so padding and alignment
//! rules live in exactly one place. Bits are written most-significant first
//! and the unused tail of the last byte is always zero.

use crate::{CellError, CellResult, MAX_CELL_BITS};

/// Append-only bit buffer with a fixed capacity.
///
/// Every write is checked against the capacity before any bit is touched,
/// so a failed write leaves the buffer exactly as it was.
///
/// # Example
///
/// ```
/// use ton_cell::BitWriter;
///
/// let mut writer = BitWriter::new();
/// writer.write_uint(0b101, 3).unwrap();
/// writer.write_bytes(&[0xFF]).unwrap();
/// assert_eq!(writer.bit_len(), 11);
/// assert_eq!(writer.data(), &[0b1011_1111, 0b1110_0000]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_len: usize,
    capacity: usize,
}

impl BitWriter {
    /// Create a writer bounded by the cell capacity (1023 bits).
    pub fn new() -> Self {
        Self::with_capacity(MAX_CELL_BITS)
    }

    /// Create a writer with a custom bit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        BitWriter {
            data: Vec::with_capacity(capacity.div_ceil(8)),
            bit_len: 0,
            capacity,
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Maximum number of bits this writer accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bits that can still be written.
    pub fn bits_left(&self) -> usize {
        self.capacity - self.bit_len
    }

    /// Packed bytes written so far (last byte may be partial).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer, returning the packed bytes and the bit length.
    pub fn into_parts(self) -> (Vec<u8>, usize) {
        (self.data, self.bit_len)
    }

    fn reserve(&self, bits: usize) -> CellResult<()> {
        let requested = self.bit_len + bits;
        if requested > self.capacity {
            return Err(CellError::CapacityExceeded {
                requested,
                max: self.capacity,
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        let byte_index = self.bit_len / 8;
        if byte_index >= self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte_index] |= 1 << (7 - (self.bit_len % 8));
        }
        self.bit_len += 1;
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: bool) -> CellResult<()> {
        self.reserve(1)?;
        self.push_bit(bit);
        Ok(())
    }

    /// Write the low `bits` bits of `value`, big-endian.
    ///
    /// Fails if `bits > 64` or if `value` does not fit in `bits` bits.
    pub fn write_uint(&mut self, value: u64, bits: usize) -> CellResult<()> {
        if bits > 64 {
            return Err(CellError::InvalidBitLength(bits));
        }
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::IntegerOverflow { bits });
        }
        self.reserve(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Write a signed integer in two's complement, big-endian.
    pub fn write_int(&mut self, value: i64, bits: usize) -> CellResult<()> {
        if bits > 64 {
            return Err(CellError::InvalidBitLength(bits));
        }
        if bits == 0 {
            return if value == 0 {
                Ok(())
            } else {
                Err(CellError::IntegerOverflow { bits })
            };
        }
        if bits < 64 {
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            if value < min || value > max {
                return Err(CellError::IntegerOverflow { bits });
            }
        }
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.write_uint(value as u64 & mask, bits)
    }

    /// Write whole bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> CellResult<()> {
        self.reserve(bytes.len() * 8)?;
        if self.bit_len % 8 == 0 {
            self.data.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for &byte in bytes {
                for i in (0..8).rev() {
                    self.push_bit((byte >> i) & 1 == 1);
                }
            }
        }
        Ok(())
    }

    /// Write the first `bit_len` bits of a packed, MSB-first bit string.
    pub fn write_bits(&mut self, src: &[u8], bit_len: usize) -> CellResult<()> {
        if bit_len > src.len() * 8 {
            return Err(CellError::NotEnoughBits {
                need: bit_len,
                have: src.len() * 8,
            });
        }
        self.reserve(bit_len)?;
        for i in 0..bit_len {
            self.push_bit((src[i / 8] >> (7 - (i % 8))) & 1 == 1);
        }
        Ok(())
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_uint_packs_msb_first() {
        let mut writer = BitWriter::new();
        writer.write_uint(0b10101, 5).unwrap();
        assert_eq!(writer.bit_len(), 5);
        assert_eq!(writer.data(), &[0b1010_1000]);
    }

    #[test]
    fn test_write_uint_rejects_oversized_value() {
        let mut writer = BitWriter::new();
        assert!(matches!(
            writer.write_uint(32, 5),
            Err(CellError::IntegerOverflow { bits: 5 })
        ));
        assert!(matches!(writer.write_uint(0, 65), Err(CellError::InvalidBitLength(65))));
        assert_eq!(writer.bit_len(), 0);
    }

    #[test]
    fn test_write_int_twos_complement() {
        let mut writer = BitWriter::new();
        writer.write_int(-1, 8).unwrap();
        writer.write_int(-15, 6).unwrap();
        assert_eq!(writer.data(), &[0xFF, 0b1100_0100]);

        assert!(writer.write_int(128, 8).is_err());
        assert!(writer.write_int(-129, 8).is_err());
        writer.write_int(i64::MIN, 64).unwrap();
    }

    #[test]
    fn test_unaligned_bytes() {
        let mut writer = BitWriter::new();
        writer.write_bit(true).unwrap();
        writer.write_bytes(&[0xFF, 0x00]).unwrap();
        assert_eq!(writer.bit_len(), 17);
        assert_eq!(writer.data(), &[0xFF, 0x80, 0x00]);
    }

    #[test]
    fn test_write_bits_copies_prefix() {
        let mut writer = BitWriter::new();
        writer.write_bits(&[0b1100_1111], 4).unwrap();
        assert_eq!(writer.bit_len(), 4);
        assert_eq!(writer.data(), &[0b1100_0000]);
        assert!(writer.write_bits(&[0xFF], 9).is_err());
    }

    #[test]
    fn test_capacity_is_all_or_nothing() {
        let mut writer = BitWriter::with_capacity(10);
        writer.write_uint(0, 8).unwrap();
        assert!(matches!(
            writer.write_uint(0, 3),
            Err(CellError::CapacityExceeded { requested: 11, max: 10 })
        ));
        assert_eq!(writer.bit_len(), 8);
        assert_eq!(writer.bits_left(), 2);
        writer.write_uint(0b11, 2).unwrap();
        assert_eq!(writer.bits_left(), 0);
    }
}
