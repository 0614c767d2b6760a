//! TON contract address derivation
//!
//! This crate computes the on-chain address a contract will have before it
//! is deployed:
//! - StateInit: the contract's initialization cell (code, data, ...)
//! - Init fields: typed `init` parameters packed into the data cell
//! - Derivation: `(chain id, hash(StateInit))` and its friendly rendering
//! - Compiler: where code cells come from (precompiled BoC artifacts)
//! - Deployment plans: contracts that embed each other's addresses,
//!   derived in dependency order
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ton_cell::{CellBuilder, RawAddress};
//! use ton_contract::{derive_address, InitField};
//!
//! let mut code = CellBuilder::new();
//! code.store_u32(0xFF00F4A4).unwrap();
//! let code = Arc::new(code.build().unwrap());
//!
//! let owner = RawAddress::new(0, [0x11; 32]);
//! let master = derive_address(0, code.clone(), &[InitField::address("owner", owner)]).unwrap();
//!
//! // A second contract stores the first one's future address.
//! let log = derive_address(0, code, &[InitField::address("owner", master.address())]).unwrap();
//! assert_ne!(master.address(), log.address());
//! ```

pub mod compiler;
pub mod config;
pub mod deriver;
pub mod error;
pub mod fields;
pub mod plan;
pub mod state_init;

// Re-exports
pub use compiler::{BocArtifactLoader, CodeCompiler, CompileError};
pub use config::{ContractConfig, FieldConfig, FieldValueConfig, PlanConfig};
pub use deriver::{contract_address, derive_address, derive_address_with_flags, AddressDeriver};
pub use error::{ContractError, ContractResult};
pub use fields::{build_data_cell, InitField, InitValue};
pub use plan::{
    ContractOutcome, ContractReport, ContractSpec, DeploymentPlan, FieldSource, PlanReport,
    PlannedField,
};
pub use state_init::{StateInit, TickTock, MAX_SPLIT_DEPTH};
