//! TON Cell, hashing and address library
//!
//! This crate provides the data structures needed to derive contract
//! addresses ahead of deployment:
//!
//! - **BitWriter**: Bounded bit buffer used by every store operation
//! - **Cell**: The basic unit of data storage in TON
//! - **CellBuilder**: Builder for creating cells
//! - **CellSlice**: Reader for extracting data from cells
//! - **MerkleHasher**: Representation hash and depth of a cell tree
//! - **BagOfCells**: Serialization format for cells
//! - **RawAddress / FormattedAddress**: Raw and user-friendly TON addresses
//!
//! # Overview
//!
//! In TON, all data is stored as cells. A cell contains:
//! - Up to 1023 bits of data
//! - Up to 4 references to other cells
//!
//! This creates a DAG (Directed Acyclic Graph) structure where complex
//! data structures are built by combining cells. The hash of a cell covers
//! its own bits and, transitively, the hashes and depths of its children.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ton_cell::{AddressFlags, CellBuilder, FormattedAddress, MsgAddress, RawAddress};
//!
//! let owner = RawAddress::new(0, [0x11; 32]);
//!
//! let mut builder = CellBuilder::new();
//! builder.store_address(&MsgAddress::Internal(owner)).unwrap();
//! let data = Arc::new(builder.build().unwrap());
//!
//! let hash = data.hash().unwrap();
//! let friendly = FormattedAddress::new(RawAddress::new(0, hash), AddressFlags::default());
//! let parsed: FormattedAddress = friendly.to_string().parse().unwrap();
//! assert_eq!(parsed.address(), friendly.address());
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;

mod address;
mod bits;
mod boc;
mod builder;
mod cell;
mod hasher;
mod slice;

pub use address::{
    AddressFlags, FormattedAddress, MsgAddress, RawAddress, BOUNCEABLE_TAG, FRIENDLY_ADDRESS_BYTES,
    FRIENDLY_ADDRESS_LEN, NON_BOUNCEABLE_TAG, TEST_ONLY_FLAG,
};
pub use bits::BitWriter;
pub use boc::BagOfCells;
pub use builder::CellBuilder;
pub use cell::{Cell, DEPTH_BYTES, HASH_BYTES};
pub use hasher::{CellInfo, MerkleHasher};
pub use slice::CellSlice;

/// Errors that can occur during Cell/BoC/address operations.
#[derive(Debug, Error)]
pub enum CellError {
    /// A write would push the cell data past its bit capacity.
    #[error("Cell capacity exceeded: {requested} bits requested (max {max})")]
    CapacityExceeded { requested: usize, max: usize },

    /// The cell already holds the maximum of 4 references.
    #[error("Too many cell references: {0} (max 4)")]
    TooManyReferences(usize),

    /// The cell tree is deeper than the configured ceiling.
    #[error("Cell tree depth {depth} exceeds maximum {max}")]
    DepthOverflow { depth: usize, max: usize },

    /// An address is absent or cannot be stored where the schema requires one.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A user-friendly address failed CRC16 verification.
    #[error("Address checksum mismatch: expected {expected:04x}, got {actual:04x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// A user-friendly address has the wrong length, encoding or tag.
    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    /// Invalid BoC format.
    #[error("Invalid BoC format: {0}")]
    InvalidBoc(String),

    /// A cell's representation was requested before its children were hashed.
    #[error("Cell hashed before its children")]
    HashOrder,

    /// Cell not found in BoC.
    #[error("Cell not found: index {0}")]
    CellNotFound(usize),

    /// CRC32 checksum mismatch.
    #[error("CRC32 mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// Unexpected end of data.
    #[error("Unexpected end of data")]
    UnexpectedEof,

    /// Not enough bits available.
    #[error("Not enough bits: need {need}, have {have}")]
    NotEnoughBits { need: usize, have: usize },

    /// Not enough references available.
    #[error("Not enough refs: need {need}, have {have}")]
    NotEnoughRefs { need: usize, have: usize },

    /// Invalid base64 encoding.
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    /// Expected single root but found multiple or none.
    #[error("Expected single root, found {0}")]
    NotSingleRoot(usize),

    /// Invalid bit length.
    #[error("Invalid bit length: {0}")]
    InvalidBitLength(usize),

    /// An integer does not fit in the requested bit width.
    #[error("Value does not fit in {bits} bits")]
    IntegerOverflow { bits: usize },
}

/// Result type for Cell/BoC operations.
pub type CellResult<T> = Result<T, CellError>;

/// Maximum number of bits in a cell's data.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have.
pub const MAX_CELL_REFS: usize = 4;

/// Maximum number of bytes in cell data (128 bytes = 1024 bits, but we use 1023 max).
pub const MAX_CELL_BYTES: usize = 128;

/// Maximum depth of a cell tree.
/// Reference: ton-blockchain/ton/crypto/vm/cells/CellTraits.h max_depth = 1024
pub const MAX_CELL_DEPTH: usize = 1024;

/// BoC magic number for generic BoC.
pub const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// BoC magic number for indexed BoC.
pub const BOC_INDEXED_MAGIC: u32 = 0x68ff65f3;

/// BoC magic number for indexed CRC32 BoC.
pub const BOC_INDEXED_CRC32_MAGIC: u32 = 0xacc3a728;

/// Compute SHA256 hash of the input data.
fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute CRC32-C checksum (Castagnoli polynomial).
fn crc32c(data: &[u8]) -> u32 {
    const CRC32C: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);
    CRC32C.checksum(data)
}

/// Compute CRC16-XMODEM checksum (poly 0x1021, init 0, no final XOR).
fn crc16_xmodem(data: &[u8]) -> u16 {
    const CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);
    CRC16.checksum(data)
}
