//! CellSlice for reading data from TON cells.
//!
//! A CellSlice provides methods to sequentially read data from a cell,
//! tracking the current position within the cell's data and references.

use std::sync::Arc;

use crate::{BitWriter, Cell, CellError, CellResult, MsgAddress, RawAddress};

/// A slice view into a Cell for reading data.
///
/// CellSlice tracks the current read position and allows sequential
/// reading of bits, integers, bytes, addresses and references.
///
/// # Example
///
/// ```
/// use ton_cell::{CellBuilder, CellSlice};
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// let cell = builder.build().unwrap();
///
/// let mut slice = CellSlice::new(&cell);
/// let value = slice.load_u32().unwrap();
/// assert_eq!(value, 0x12345678);
/// ```
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    /// Reference to the underlying cell.
    pub(crate) cell: &'a Cell,
    /// Current bit offset within the cell data.
    pub(crate) bit_offset: usize,
    /// Number of bits remaining (from bit_offset).
    pub(crate) bit_len: usize,
    /// Current reference offset.
    pub(crate) ref_offset: usize,
}

impl<'a> CellSlice<'a> {
    /// Create a new slice from a cell.
    pub fn new(cell: &'a Cell) -> Self {
        CellSlice {
            cell,
            bit_offset: 0,
            bit_len: cell.bit_len(),
            ref_offset: 0,
        }
    }

    /// Load a single bit.
    pub fn load_bit(&mut self) -> CellResult<bool> {
        if self.bit_len == 0 {
            return Err(CellError::NotEnoughBits { need: 1, have: 0 });
        }

        let bit = self.get_bit_at(self.bit_offset);
        self.bit_offset += 1;
        self.bit_len -= 1;
        Ok(bit)
    }

    /// Load multiple bits.
    pub fn load_bits(&mut self, count: usize) -> CellResult<Vec<bool>> {
        self.ensure_bits(count)?;
        (0..count).map(|_| self.load_bit()).collect()
    }

    /// Load an unsigned 8-bit integer.
    pub fn load_u8(&mut self) -> CellResult<u8> {
        self.load_uint(8).map(|v| v as u8)
    }

    /// Load an unsigned 16-bit integer (big-endian).
    pub fn load_u16(&mut self) -> CellResult<u16> {
        self.load_uint(16).map(|v| v as u16)
    }

    /// Load an unsigned 32-bit integer (big-endian).
    pub fn load_u32(&mut self) -> CellResult<u32> {
        self.load_uint(32).map(|v| v as u32)
    }

    /// Load an unsigned 64-bit integer (big-endian).
    pub fn load_u64(&mut self) -> CellResult<u64> {
        self.load_uint(64)
    }

    /// Load a signed 8-bit integer.
    pub fn load_i8(&mut self) -> CellResult<i8> {
        self.load_int(8).map(|v| v as i8)
    }

    /// Load a signed 16-bit integer (big-endian).
    pub fn load_i16(&mut self) -> CellResult<i16> {
        self.load_int(16).map(|v| v as i16)
    }

    /// Load a signed 32-bit integer (big-endian).
    pub fn load_i32(&mut self) -> CellResult<i32> {
        self.load_int(32).map(|v| v as i32)
    }

    /// Load a signed 64-bit integer (big-endian).
    pub fn load_i64(&mut self) -> CellResult<i64> {
        self.load_int(64)
    }

    /// Load an unsigned integer with a specific bit width.
    pub fn load_uint(&mut self, bits: usize) -> CellResult<u64> {
        if bits > 64 {
            return Err(CellError::InvalidBitLength(bits));
        }
        self.ensure_bits(bits)?;

        let mut result: u64 = 0;
        for _ in 0..bits {
            result = (result << 1) | (self.load_bit()? as u64);
        }

        Ok(result)
    }

    /// Load a signed integer with a specific bit width (two's complement).
    pub fn load_int(&mut self, bits: usize) -> CellResult<i64> {
        if bits == 0 {
            return Ok(0);
        }

        let unsigned = self.load_uint(bits)?;

        // Sign extend if needed
        if bits < 64 && unsigned & (1u64 << (bits - 1)) != 0 {
            Ok((unsigned | !((1u64 << bits) - 1)) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Load a byte array.
    pub fn load_bytes(&mut self, count: usize) -> CellResult<Vec<u8>> {
        self.ensure_bits(count * 8)?;
        (0..count).map(|_| self.load_u8()).collect()
    }

    /// Load a reference to another cell.
    pub fn load_ref(&mut self) -> CellResult<&'a Cell> {
        self.load_ref_arc().map(|cell| cell.as_ref())
    }

    /// Load a reference, keeping the shared handle.
    pub fn load_ref_arc(&mut self) -> CellResult<&'a Arc<Cell>> {
        let reference = self
            .cell
            .reference(self.ref_offset)
            .ok_or(CellError::NotEnoughRefs { need: 1, have: 0 })?;
        self.ref_offset += 1;
        Ok(reference)
    }

    /// Load `Maybe ^Cell`.
    pub fn load_maybe_ref(&mut self) -> CellResult<Option<&'a Arc<Cell>>> {
        if self.load_bit()? {
            self.load_ref_arc().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Load coins (VarUInteger 16).
    ///
    /// Format: 4 bits for byte length, then the value in that many bytes.
    pub fn load_coins(&mut self) -> CellResult<u128> {
        let byte_len = self.load_uint(4)? as usize;

        let mut result: u128 = 0;
        for _ in 0..byte_len {
            result = (result << 8) | (self.load_u8()? as u128);
        }

        Ok(result)
    }

    /// Load a message address.
    ///
    /// Only `addr_none` and anycast-free `addr_std` are accepted; those are
    /// the only forms a contract init field can hold here.
    pub fn load_address(&mut self) -> CellResult<MsgAddress> {
        let addr_type = self.load_uint(2)? as u8;

        match addr_type {
            // addr_none$00
            0b00 => Ok(MsgAddress::Null),
            // addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256
            0b10 => {
                if self.load_bit()? {
                    return Err(CellError::InvalidAddress(
                        "anycast addresses are not supported".to_string(),
                    ));
                }

                let workchain = self.load_i8()?;
                let address_bytes = self.load_bytes(32)?;
                let mut address = [0u8; 32];
                address.copy_from_slice(&address_bytes);

                Ok(MsgAddress::Internal(RawAddress::new(workchain, address)))
            }
            other => Err(CellError::InvalidAddress(format!(
                "Unsupported address type: {:02b}",
                other
            ))),
        }
    }

    /// Get the number of bits remaining.
    pub fn bits_left(&self) -> usize {
        self.bit_len
    }

    /// Get the number of references remaining.
    pub fn refs_left(&self) -> usize {
        self.cell.reference_count() - self.ref_offset
    }

    /// Skip a number of bits.
    pub fn skip_bits(&mut self, count: usize) -> CellResult<()> {
        self.ensure_bits(count)?;
        self.bit_offset += count;
        self.bit_len -= count;
        Ok(())
    }

    /// Check if the slice is empty (no bits or refs left).
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0 && self.refs_left() == 0
    }

    /// Remaining bits packed MSB-first, without advancing the slice.
    pub(crate) fn peek_bits_packed(&self) -> CellResult<Vec<u8>> {
        let mut writer = BitWriter::with_capacity(self.bit_len);
        for i in 0..self.bit_len {
            writer.write_bit(self.get_bit_at(self.bit_offset + i))?;
        }
        Ok(writer.into_parts().0)
    }

    /// Get the bit value at a specific position.
    pub(crate) fn get_bit_at(&self, index: usize) -> bool {
        self.cell.get_bit(index).unwrap_or(false)
    }

    fn ensure_bits(&self, need: usize) -> CellResult<()> {
        if need > self.bit_len {
            return Err(CellError::NotEnoughBits {
                need,
                have: self.bit_len,
            });
        }
        Ok(())
    }

    /// Get the underlying cell.
    pub fn cell(&self) -> &'a Cell {
        self.cell
    }
}
