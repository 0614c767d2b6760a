//! Contract address derivation.
//!
//! The address of a contract is its chain id paired with the representation
//! hash of its StateInit root cell. The derivation is a pure function of
//! (chain id, code, data): any two callers with identical input get the
//! same address, which is what lets contracts embed each other's
//! addresses before any of them is deployed.

use std::sync::Arc;

use tracing::debug;
use ton_cell::{AddressFlags, Cell, FormattedAddress, MerkleHasher, RawAddress};

use crate::error::{ContractError, ContractResult};
use crate::fields::{build_data_cell, InitField};
use crate::state_init::StateInit;

/// Derives addresses on one chain.
///
/// Every call hashes with its own [`MerkleHasher`], so a deriver can be
/// shared freely between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    chain_id: i8,
}

impl AddressDeriver {
    pub fn new(chain_id: i8) -> Self {
        AddressDeriver { chain_id }
    }

    pub fn chain_id(&self) -> i8 {
        self.chain_id
    }

    /// Address of an already encoded StateInit root.
    pub fn derive(&self, state_init_root: &Cell) -> ContractResult<RawAddress> {
        let mut hasher = MerkleHasher::new();
        let hash = hasher.hash(state_init_root)?;
        Ok(RawAddress::new(self.chain_id, hash))
    }

    /// Encode `state_init` and derive its address. Code is mandatory.
    pub fn derive_state_init(&self, state_init: &StateInit) -> ContractResult<RawAddress> {
        if state_init.code.is_none() {
            return Err(ContractError::MissingCode);
        }
        let root = state_init.to_cell()?;
        self.derive(&root)
    }
}

/// `(chain_id, hash(StateInit))` for the given StateInit.
pub fn contract_address(chain_id: i8, state_init: &StateInit) -> ContractResult<RawAddress> {
    AddressDeriver::new(chain_id).derive_state_init(state_init)
}

/// Derive the user-friendly address of a contract from its code and
/// ordered init fields, rendered non-bounceable for mainnet.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ton_cell::{CellBuilder, RawAddress};
/// use ton_contract::{derive_address, InitField};
///
/// let mut code = CellBuilder::new();
/// code.store_bytes(&[0xFF, 0x00, 0xF4, 0xA4, 0x13, 0xF4, 0xBC, 0xF2, 0xC8, 0x0B]).unwrap();
/// let code = Arc::new(code.build().unwrap());
///
/// let owner = RawAddress::new(0, [0x11; 32]);
/// let address = derive_address(0, code, &[InitField::address("owner", owner)]).unwrap();
/// assert_eq!(address.to_string(), "UQDp0UNEJ7EwmLzN2n1nwOZ_iiAbt7QO4Z24RKE6ntnvFF4-");
/// ```
pub fn derive_address(
    chain_id: i8,
    code: Arc<Cell>,
    fields: &[InitField],
) -> ContractResult<FormattedAddress> {
    derive_address_with_flags(chain_id, code, fields, AddressFlags::default())
}

/// [`derive_address`] with explicit presentation flags.
pub fn derive_address_with_flags(
    chain_id: i8,
    code: Arc<Cell>,
    fields: &[InitField],
    flags: AddressFlags,
) -> ContractResult<FormattedAddress> {
    let data = build_data_cell(fields)?;
    let address = contract_address(chain_id, &StateInit::new(code, data))?;
    debug!("derived {} from {} init fields", address, fields.len());
    Ok(FormattedAddress::new(address, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ton_cell::CellBuilder;

    fn code() -> Arc<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(0xDEADBEEF).unwrap();
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_missing_code() {
        let state_init = StateInit {
            data: Some(Arc::new(Cell::empty())),
            ..Default::default()
        };
        assert!(matches!(
            contract_address(0, &state_init),
            Err(ContractError::MissingCode)
        ));
    }

    #[test]
    fn test_derive_matches_root_hash() {
        let state_init = StateInit::new(code(), Arc::new(Cell::empty()));
        let root = state_init.to_cell().unwrap();
        let address = contract_address(-1, &state_init).unwrap();
        assert_eq!(address.workchain(), -1);
        assert_eq!(address.hash_part(), &root.hash().unwrap());
    }

    #[test]
    fn test_chain_id_does_not_change_hash() {
        let fields = [InitField::address("owner", RawAddress::new(0, [7; 32]))];
        let base = derive_address(0, code(), &fields).unwrap();
        let master = derive_address(-1, code(), &fields).unwrap();
        assert_eq!(base.address().hash_part(), master.address().hash_part());
        assert_ne!(base.address(), master.address());
    }

    #[test]
    fn test_flags_only_change_presentation() {
        let fields = [InitField::address("owner", RawAddress::new(0, [7; 32]))];
        let plain = derive_address(0, code(), &fields).unwrap();
        let flagged =
            derive_address_with_flags(0, code(), &fields, AddressFlags::new(true, true)).unwrap();
        assert_eq!(plain.address(), flagged.address());
        assert_ne!(plain.to_string(), flagged.to_string());
        assert!(!plain.flags().bounceable);
    }
}
