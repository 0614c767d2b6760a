//! Contract init fields and the data cell built from them.
//!
//! Field order is part of the contract ABI: the data cell stores values
//! exactly in the order the contract's `init` declares its parameters, so
//! reordering fields changes the derived address.

use std::sync::Arc;

use tracing::warn;
use ton_cell::{Cell, CellBuilder, CellResult, MsgAddress, RawAddress};

use crate::error::ContractResult;

/// A typed init parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitValue {
    /// Required `addr_std` (267 bits).
    Address(RawAddress),
    /// Optional address; `None` is stored as `addr_none`.
    MaybeAddress(Option<RawAddress>),
    Uint { value: u64, bits: usize },
    Int { value: i64, bits: usize },
    Bool(bool),
    /// Nanotons as VarUInteger 16.
    Coins(u128),
    Bytes(Vec<u8>),
    /// A child cell, stored as a reference.
    Ref(Arc<Cell>),
}

impl InitValue {
    /// Append this value to `builder`.
    pub fn store(&self, builder: &mut CellBuilder) -> CellResult<()> {
        match self {
            InitValue::Address(address) => {
                builder.store_address(&MsgAddress::Internal(*address))?;
            }
            InitValue::MaybeAddress(address) => {
                let address = address.map(MsgAddress::Internal).unwrap_or_default();
                builder.store_maybe_address(&address)?;
            }
            InitValue::Uint { value, bits } => {
                builder.store_uint(*value, *bits)?;
            }
            InitValue::Int { value, bits } => {
                builder.store_int(*value, *bits)?;
            }
            InitValue::Bool(value) => {
                builder.store_bit(*value)?;
            }
            InitValue::Coins(value) => {
                builder.store_coins(*value)?;
            }
            InitValue::Bytes(bytes) => {
                builder.store_bytes(bytes)?;
            }
            InitValue::Ref(cell) => {
                builder.store_ref(cell.clone())?;
            }
        }
        Ok(())
    }
}

impl From<RawAddress> for InitValue {
    fn from(address: RawAddress) -> Self {
        InitValue::Address(address)
    }
}

/// A named init parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitField {
    name: String,
    value: InitValue,
}

impl InitField {
    pub fn new(name: impl Into<String>, value: impl Into<InitValue>) -> Self {
        InitField {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Shorthand for an address parameter.
    pub fn address(name: impl Into<String>, address: RawAddress) -> Self {
        Self::new(name, InitValue::Address(address))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &InitValue {
        &self.value
    }
}

/// Build the data cell from fields, strictly in the given order.
///
/// # Example
///
/// ```
/// use ton_cell::RawAddress;
/// use ton_contract::{build_data_cell, InitField};
///
/// let owner = RawAddress::new(0, [0x11; 32]);
/// let data = build_data_cell(&[InitField::address("owner", owner)]).unwrap();
/// assert_eq!(data.bit_len(), 267);
/// ```
pub fn build_data_cell(fields: &[InitField]) -> ContractResult<Arc<Cell>> {
    let mut builder = CellBuilder::new();
    for field in fields {
        if let Err(e) = field.value.store(&mut builder) {
            warn!("init field '{}' cannot be stored: {}", field.name, e);
            return Err(e.into());
        }
    }
    Ok(Arc::new(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContractError;
    use ton_cell::{CellError, CellSlice};

    #[test]
    fn test_fields_stored_in_order() {
        let owner = RawAddress::new(0, [0x11; 32]);
        let fields = vec![
            InitField::new("seqno", InitValue::Uint { value: 7, bits: 32 }),
            InitField::new("active", InitValue::Bool(true)),
            InitField::address("owner", owner),
            InitField::new("admin", InitValue::MaybeAddress(None)),
            InitField::new("balance", InitValue::Coins(1_000_000_000)),
            InitField::new("delta", InitValue::Int { value: -3, bits: 8 }),
        ];
        let cell = build_data_cell(&fields).unwrap();

        let mut slice = CellSlice::new(&cell);
        assert_eq!(slice.load_u32().unwrap(), 7);
        assert!(slice.load_bit().unwrap());
        assert_eq!(slice.load_address().unwrap(), MsgAddress::Internal(owner));
        assert_eq!(slice.load_address().unwrap(), MsgAddress::Null);
        assert_eq!(slice.load_coins().unwrap(), 1_000_000_000);
        assert_eq!(slice.load_i8().unwrap(), -3);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_field_order_changes_cell() {
        let a = InitField::address("a", RawAddress::new(0, [1; 32]));
        let b = InitField::address("b", RawAddress::new(0, [2; 32]));
        let ab = build_data_cell(&[a.clone(), b.clone()]).unwrap();
        let ba = build_data_cell(&[b, a]).unwrap();
        assert_ne!(ab.hash().unwrap(), ba.hash().unwrap());
    }

    #[test]
    fn test_bytes_and_ref() {
        let child = Arc::new(Cell::empty());
        let fields = vec![
            InitField::new("tag", InitValue::Bytes(vec![0xCA, 0xFE])),
            InitField::new("content", InitValue::Ref(child.clone())),
        ];
        let cell = build_data_cell(&fields).unwrap();
        assert_eq!(cell.data(), &[0xCA, 0xFE]);
        assert_eq!(cell.reference(0), Some(&child));
    }

    #[test]
    fn test_too_many_addresses() {
        let fields: Vec<_> = (0..4)
            .map(|i| InitField::address(format!("a{}", i), RawAddress::new(0, [i; 32])))
            .collect();
        assert!(matches!(
            build_data_cell(&fields),
            Err(ContractError::Cell(CellError::CapacityExceeded { .. }))
        ));
    }

    #[test]
    fn test_uint_overflow_rejected() {
        let fields = vec![InitField::new("x", InitValue::Uint { value: 256, bits: 8 })];
        assert!(matches!(
            build_data_cell(&fields),
            Err(ContractError::Cell(CellError::IntegerOverflow { bits: 8 }))
        ));
    }
}
