//! StateInit: the initialization material of a not-yet-deployed contract.
//!
//! ```text
//! _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
//!   code:(Maybe ^Cell) data:(Maybe ^Cell)
//!   library:(Maybe ^Cell) = StateInit;
//! tick_tock$_ tick:Bool tock:Bool = TickTock;
//! ```
//!
//! Presence bits and inline values go into the root cell in this order;
//! present cells become references in the order code, data, library.

use std::sync::Arc;

use ton_cell::{Cell, CellBuilder, CellSlice};

use crate::error::{ContractError, ContractResult};

/// Largest split depth representable in 5 bits.
pub const MAX_SPLIT_DEPTH: u8 = 31;

/// Tick/tock flags of a special (system) contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickTock {
    pub tick: bool,
    pub tock: bool,
}

/// Contract initialization state.
///
/// Ordinary contracts set only `code` and `data`; every field is still
/// encodable independently.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ton_cell::{Cell, CellBuilder};
/// use ton_contract::StateInit;
///
/// let mut code = CellBuilder::new();
/// code.store_u32(0xFF00F4A4).unwrap();
/// let state_init = StateInit::new(Arc::new(code.build().unwrap()), Arc::new(Cell::empty()));
///
/// let root = state_init.to_cell().unwrap();
/// assert_eq!(root.bit_len(), 5);
/// assert_eq!(root.reference_count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateInit {
    pub split_depth: Option<u8>,
    pub special: Option<TickTock>,
    pub code: Option<Arc<Cell>>,
    pub data: Option<Arc<Cell>>,
    pub library: Option<Arc<Cell>>,
}

impl StateInit {
    /// StateInit with code and data only.
    pub fn new(code: Arc<Cell>, data: Arc<Cell>) -> Self {
        StateInit {
            code: Some(code),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_split_depth(mut self, split_depth: u8) -> Self {
        self.split_depth = Some(split_depth);
        self
    }

    pub fn with_special(mut self, special: TickTock) -> Self {
        self.special = Some(special);
        self
    }

    /// Attach a public library dictionary root.
    pub fn with_library(mut self, library: Arc<Cell>) -> Self {
        self.library = Some(library);
        self
    }

    /// Encode into the root cell.
    pub fn to_cell(&self) -> ContractResult<Cell> {
        let mut builder = CellBuilder::new();

        match self.split_depth {
            Some(depth) if depth > MAX_SPLIT_DEPTH => {
                return Err(ContractError::InvalidSplitDepth(depth));
            }
            Some(depth) => {
                builder.store_bit(true)?;
                builder.store_uint(depth as u64, 5)?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }

        match self.special {
            Some(special) => {
                builder.store_bit(true)?;
                builder.store_bit(special.tick)?;
                builder.store_bit(special.tock)?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }

        builder.store_maybe_ref(self.code.clone())?;
        builder.store_maybe_ref(self.data.clone())?;
        builder.store_maybe_ref(self.library.clone())?;

        builder.build().map_err(Into::into)
    }

    /// Decode a root cell produced by [`StateInit::to_cell`] or any other
    /// standard encoder.
    pub fn from_cell(cell: &Cell) -> ContractResult<Self> {
        let mut slice = CellSlice::new(cell);

        let split_depth = if slice.load_bit()? {
            Some(slice.load_uint(5)? as u8)
        } else {
            None
        };

        let special = if slice.load_bit()? {
            Some(TickTock {
                tick: slice.load_bit()?,
                tock: slice.load_bit()?,
            })
        } else {
            None
        };

        let code = slice.load_maybe_ref()?.cloned();
        let data = slice.load_maybe_ref()?.cloned();
        let library = slice.load_maybe_ref()?.cloned();

        if !slice.is_empty() {
            return Err(ContractError::MalformedStateInit(format!(
                "{} trailing bits, {} trailing refs",
                slice.bits_left(),
                slice.refs_left()
            )));
        }

        Ok(StateInit {
            split_depth,
            special,
            code,
            data,
            library,
        })
    }
}
