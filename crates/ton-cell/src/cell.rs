//! Cell implementation for TON.
//!
//! A Cell is the fundamental data unit in TON, containing up to 1023 bits
//! of data and up to 4 references to other cells.
//!
//! Only ordinary cells are modelled. Hashes and depths are not cached on the
//! cell; they are computed by [`MerkleHasher`](crate::MerkleHasher), which
//! memoizes per derivation call.
//!
//! Reference: ton-blockchain/ton/crypto/vm/cells/DataCell.cpp

use std::sync::Arc;

use crate::{BagOfCells, CellResult, MerkleHasher, MAX_CELL_BITS, MAX_CELL_REFS};

/// Hash size in bytes (SHA256).
pub const HASH_BYTES: usize = 32;

/// Depth size in bytes.
pub const DEPTH_BYTES: usize = 2;

/// A TON Cell - the basic unit of data storage.
///
/// Cells form a DAG (Directed Acyclic Graph) where each cell can reference
/// up to 4 other cells. Cells are immutable once built, so a tree can be
/// shared freely through `Arc` handles and can never contain a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Raw data bytes (may contain partial byte at the end).
    pub(crate) data: Vec<u8>,
    /// Number of bits stored in data.
    pub(crate) bit_len: usize,
    /// References to child cells.
    pub(crate) references: Vec<Arc<Cell>>,
}

impl Cell {
    /// Create a new cell with the given parameters.
    ///
    /// This is called by `CellBuilder::build()` and the BoC parser, both of
    /// which enforce the capacity limits beforehand.
    pub(crate) fn new(data: Vec<u8>, bit_len: usize, references: Vec<Arc<Cell>>) -> Self {
        debug_assert!(bit_len <= MAX_CELL_BITS);
        debug_assert!(references.len() <= MAX_CELL_REFS);
        debug_assert!(data.len() == bit_len.div_ceil(8));

        Cell {
            data,
            bit_len,
            references,
        }
    }

    /// Create an empty cell.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, Vec::new())
    }

    /// Representation hash of this cell.
    ///
    /// Uses a fresh [`MerkleHasher`]; hash several related cells through one
    /// hasher to share the memo table.
    pub fn hash(&self) -> CellResult<[u8; HASH_BYTES]> {
        MerkleHasher::new().hash(self)
    }

    /// Depth of this cell: 0 for a leaf, otherwise 1 + max child depth.
    pub fn depth(&self) -> CellResult<u16> {
        MerkleHasher::new().depth(self)
    }

    /// Get the descriptor bytes (d1, d2) for this ordinary cell.
    ///
    /// d1 = refs_count (no exotic flag, level 0)
    /// d2 = ceil(bit_len / 8) + floor(bit_len / 8)
    pub fn descriptors(&self) -> (u8, u8) {
        let d1 = self.references.len() as u8;
        let d2 = (self.bit_len.div_ceil(8) + self.bit_len / 8) as u8;
        (d1, d2)
    }

    /// Get data with completion tag.
    ///
    /// If bit_len is not byte-aligned, the last byte has a completion tag:
    /// the remaining bits are filled with a 1 followed by 0s.
    pub fn data_with_completion_tag(&self) -> Vec<u8> {
        let mut result = self.data.clone();
        let remainder = self.bit_len % 8;
        if remainder != 0
            && let Some(last) = result.last_mut()
        {
            *last |= 1 << (7 - remainder);
        }
        result
    }

    /// Get the raw data bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the number of bits in this cell.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Get all references to child cells.
    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// Get a reference by index.
    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.references.get(index)
    }

    /// Get the number of references.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Get the number of bytes needed to store the data (rounded up).
    pub fn byte_len(&self) -> usize {
        self.bit_len.div_ceil(8)
    }

    /// Get a specific bit from the cell data.
    ///
    /// Returns None if the index is out of bounds.
    pub fn get_bit(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len {
            return None;
        }

        let byte_index = index / 8;
        let bit_index = 7 - (index % 8);

        Some((self.data[byte_index] >> bit_index) & 1 == 1)
    }

    /// Serialize this cell tree as a base64 BoC (the usual exchange format).
    pub fn to_boc_base64(self: &Arc<Self>) -> CellResult<String> {
        BagOfCells::new(vec![self.clone()]).serialize_to_base64()
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}
