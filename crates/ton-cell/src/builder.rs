//! CellBuilder for constructing TON cells.
//!
//! The builder allows storing bits, integers, bytes, addresses and
//! references to other cells, then building the final Cell. Bit packing is
//! delegated to [`BitWriter`].

use std::sync::Arc;

use crate::{BitWriter, Cell, CellError, CellResult, CellSlice, MsgAddress, MAX_CELL_REFS};

/// Builder for constructing TON cells.
///
/// CellBuilder provides methods to store various data types into a cell,
/// then finalize it with `build()`. `build()` consumes the builder, so a
/// builder can only ever produce one cell.
///
/// # Example
///
/// ```
/// use ton_cell::CellBuilder;
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// builder.store_bytes(&[1, 2, 3, 4]).unwrap();
/// let cell = builder.build().unwrap();
/// assert_eq!(cell.bit_len(), 64);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    /// Data bits.
    bits: BitWriter,
    /// References to other cells.
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    /// Create a new empty CellBuilder.
    pub fn new() -> Self {
        CellBuilder {
            bits: BitWriter::new(),
            references: Vec::with_capacity(MAX_CELL_REFS),
        }
    }

    /// Store a single bit.
    pub fn store_bit(&mut self, bit: bool) -> CellResult<&mut Self> {
        self.bits.write_bit(bit)?;
        Ok(self)
    }

    /// Store multiple bits.
    pub fn store_bits(&mut self, bits: &[bool]) -> CellResult<&mut Self> {
        if bits.len() > self.bits.bits_left() {
            return Err(CellError::CapacityExceeded {
                requested: self.bits.bit_len() + bits.len(),
                max: self.bits.capacity(),
            });
        }
        for &bit in bits {
            self.bits.write_bit(bit)?;
        }
        Ok(self)
    }

    /// Store an unsigned 8-bit integer.
    pub fn store_u8(&mut self, value: u8) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 8)
    }

    /// Store an unsigned 16-bit integer (big-endian).
    pub fn store_u16(&mut self, value: u16) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 16)
    }

    /// Store an unsigned 32-bit integer (big-endian).
    pub fn store_u32(&mut self, value: u32) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 32)
    }

    /// Store an unsigned 64-bit integer (big-endian).
    pub fn store_u64(&mut self, value: u64) -> CellResult<&mut Self> {
        self.store_uint(value, 64)
    }

    /// Store a signed 8-bit integer.
    pub fn store_i8(&mut self, value: i8) -> CellResult<&mut Self> {
        self.store_int(value as i64, 8)
    }

    /// Store a signed 16-bit integer (big-endian).
    pub fn store_i16(&mut self, value: i16) -> CellResult<&mut Self> {
        self.store_int(value as i64, 16)
    }

    /// Store a signed 32-bit integer (big-endian).
    pub fn store_i32(&mut self, value: i32) -> CellResult<&mut Self> {
        self.store_int(value as i64, 32)
    }

    /// Store a signed 64-bit integer (big-endian).
    pub fn store_i64(&mut self, value: i64) -> CellResult<&mut Self> {
        self.store_int(value, 64)
    }

    /// Store an unsigned integer with a specific bit width.
    ///
    /// The value is stored in big-endian format. Values that do not fit in
    /// `bits` are rejected rather than truncated.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> CellResult<&mut Self> {
        self.bits.write_uint(value, bits)?;
        Ok(self)
    }

    /// Store a signed integer with a specific bit width.
    ///
    /// The value is stored in two's complement, big-endian format.
    pub fn store_int(&mut self, value: i64, bits: usize) -> CellResult<&mut Self> {
        self.bits.write_int(value, bits)?;
        Ok(self)
    }

    /// Store a byte array.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> CellResult<&mut Self> {
        self.bits.write_bytes(bytes)?;
        Ok(self)
    }

    /// Store the remaining bits and references of a CellSlice.
    pub fn store_slice(&mut self, slice: &CellSlice) -> CellResult<&mut Self> {
        let remaining_refs = slice.refs_left();
        if remaining_refs > self.refs_left() {
            return Err(CellError::TooManyReferences(self.references.len() + remaining_refs));
        }

        let bits = slice.peek_bits_packed()?;
        self.bits.write_bits(&bits, slice.bits_left())?;

        for i in slice.ref_offset..slice.cell.reference_count() {
            if let Some(reference) = slice.cell.reference(i) {
                self.store_ref(reference.clone())?;
            }
        }

        Ok(self)
    }

    /// Store a reference to another cell.
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> CellResult<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::TooManyReferences(self.references.len() + 1));
        }

        self.references.push(cell);
        Ok(self)
    }

    /// Store `Maybe ^Cell`: a presence bit, then the reference if present.
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> CellResult<&mut Self> {
        match cell {
            Some(cell) => {
                if self.references.len() >= MAX_CELL_REFS {
                    return Err(CellError::TooManyReferences(self.references.len() + 1));
                }
                self.store_bit(true)?;
                self.store_ref(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Store coins (VarUInteger 16).
    ///
    /// This is the standard format for storing nanoton amounts in TON.
    /// Format: 4 bits for byte length, then the value in that many bytes.
    pub fn store_coins(&mut self, nanotons: u128) -> CellResult<&mut Self> {
        if nanotons == 0 {
            // Zero is stored as 4 zero bits (length = 0)
            return self.store_uint(0, 4);
        }

        let bytes_needed = (128 - nanotons.leading_zeros()).div_ceil(8) as usize;
        if bytes_needed > 15 {
            return Err(CellError::IntegerOverflow { bits: 120 });
        }

        if 4 + bytes_needed * 8 > self.bits_left() {
            return Err(CellError::CapacityExceeded {
                requested: self.bit_len() + 4 + bytes_needed * 8,
                max: self.bits.capacity(),
            });
        }

        self.store_uint(bytes_needed as u64, 4)?;
        let be = nanotons.to_be_bytes();
        self.store_bytes(&be[16 - bytes_needed..])
    }

    /// Store a message address that must be present.
    ///
    /// Internal addresses use `addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256`
    /// with no anycast, 267 bits in total. `MsgAddress::Null` is rejected.
    pub fn store_address(&mut self, addr: &MsgAddress) -> CellResult<&mut Self> {
        match addr {
            MsgAddress::Null => Err(CellError::InvalidAddress(
                "addr_none where an address is required".to_string(),
            )),
            MsgAddress::Internal(raw) => {
                if MsgAddress::STD_BITS > self.bits_left() {
                    return Err(CellError::CapacityExceeded {
                        requested: self.bit_len() + MsgAddress::STD_BITS,
                        max: self.bits.capacity(),
                    });
                }
                // addr_std$10, no anycast
                self.store_uint(0b100, 3)?;
                self.store_int(raw.workchain() as i64, 8)?;
                self.store_bytes(raw.hash_part())
            }
        }
    }

    /// Store an optional message address; `Null` becomes `addr_none$00`.
    pub fn store_maybe_address(&mut self, addr: &MsgAddress) -> CellResult<&mut Self> {
        match addr {
            MsgAddress::Null => self.store_uint(0b00, 2),
            internal => self.store_address(internal),
        }
    }

    /// Get the number of bits that can still be stored.
    pub fn bits_left(&self) -> usize {
        self.bits.bits_left()
    }

    /// Get the number of references that can still be added.
    pub fn refs_left(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Get the current number of bits stored.
    pub fn bit_len(&self) -> usize {
        self.bits.bit_len()
    }

    /// Get the current number of references.
    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    /// Build the cell.
    ///
    /// This consumes the builder and returns the constructed Cell.
    pub fn build(self) -> CellResult<Cell> {
        let (data, bit_len) = self.bits.into_parts();
        Ok(Cell::new(data, bit_len, self.references))
    }
}
