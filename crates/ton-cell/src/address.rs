//! TON address types.
//!
//! - [`RawAddress`]: workchain + 256-bit account id, the identity of a contract.
//! - [`MsgAddress`]: an address slot in a cell, either `addr_none` or internal.
//! - [`FormattedAddress`]: the user-friendly, checksummed base64 form.
//!
//! User-friendly layout (36 bytes, 48 base64url characters):
//!
//! ```text
//! tag:u8 | workchain:i8 | hash:[u8; 32] | crc16_xmodem(previous 34 bytes):u16 BE
//! ```

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::{crc16_xmodem, CellError, CellResult};

/// Tag byte of a bounceable address.
pub const BOUNCEABLE_TAG: u8 = 0x11;

/// Tag byte of a non-bounceable address.
pub const NON_BOUNCEABLE_TAG: u8 = 0x51;

/// Flag OR-ed into the tag for test-only addresses.
pub const TEST_ONLY_FLAG: u8 = 0x80;

/// Decoded size of a user-friendly address.
pub const FRIENDLY_ADDRESS_BYTES: usize = 36;

/// Encoded size of a user-friendly address.
pub const FRIENDLY_ADDRESS_LEN: usize = 48;

/// A derived on-chain identity: workchain id and account hash.
///
/// # Example
///
/// ```
/// use ton_cell::RawAddress;
///
/// let addr: RawAddress = "0:0000000000000000000000000000000000000000000000000000000000000000"
///     .parse()
///     .unwrap();
/// assert_eq!(addr.workchain(), 0);
/// assert_eq!(addr.to_string(), "0:0000000000000000000000000000000000000000000000000000000000000000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawAddress {
    workchain: i8,
    hash: [u8; 32],
}

impl RawAddress {
    /// Create an address from its parts.
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        RawAddress { workchain, hash }
    }

    /// Workchain ID (-1 for masterchain, 0 for basechain).
    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    /// The 256-bit account id.
    pub fn hash_part(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Check if this is a masterchain address (workchain -1).
    pub fn is_masterchain(&self) -> bool {
        self.workchain == -1
    }

    /// Check if this is a basechain address (workchain 0).
    pub fn is_basechain(&self) -> bool {
        self.workchain == 0
    }

    /// Render in user-friendly form with the given flags.
    pub fn to_friendly(&self, flags: AddressFlags) -> String {
        FormattedAddress::new(*self, flags).to_string()
    }

    /// Parse the raw form `"workchain:hex_address"`.
    pub fn from_raw_string(s: &str) -> CellResult<Self> {
        let (workchain_str, address_str) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| CellError::InvalidAddress(format!("Missing ':' in raw address: {}", s)))?;

        let workchain: i8 = workchain_str
            .parse()
            .map_err(|_| CellError::InvalidAddress(format!("Invalid workchain: {}", workchain_str)))?;

        if address_str.len() != 64 {
            return Err(CellError::InvalidAddress(format!(
                "Address hex must be 64 characters, got {}",
                address_str.len()
            )));
        }

        let mut hash = [0u8; 32];
        hex::decode_to_slice(address_str, &mut hash)
            .map_err(|e| CellError::InvalidAddress(format!("Invalid hex: {}", e)))?;

        Ok(RawAddress { workchain, hash })
    }
}

impl fmt::Display for RawAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.hash))
    }
}

impl FromStr for RawAddress {
    type Err = CellError;

    /// Accepts both the raw and the user-friendly form.
    fn from_str(s: &str) -> CellResult<Self> {
        if s.contains(':') {
            Self::from_raw_string(s)
        } else {
            FormattedAddress::parse(s).map(|f| f.address)
        }
    }
}

/// An address slot as stored in a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsgAddress {
    /// No address (addr_none$00).
    #[default]
    Null,

    /// Standard internal address (addr_std$10).
    Internal(RawAddress),
}

impl MsgAddress {
    /// Bit length of an anycast-free `addr_std`.
    pub const STD_BITS: usize = 2 + 1 + 8 + 256;

    /// Parse an address from a string.
    ///
    /// Supported formats:
    /// - Empty: `addr_none`
    /// - Raw: "workchain:hex_address" (e.g., "0:abc123...")
    /// - User-friendly base64: "EQ..." or "UQ..." (bounceable/non-bounceable)
    pub fn from_string(s: &str) -> CellResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(MsgAddress::Null);
        }
        s.parse::<RawAddress>().map(MsgAddress::Internal)
    }

    /// The internal address, if any.
    pub fn as_raw(&self) -> Option<&RawAddress> {
        match self {
            MsgAddress::Internal(raw) => Some(raw),
            MsgAddress::Null => None,
        }
    }

    /// Check if this is a null address.
    pub fn is_null(&self) -> bool {
        matches!(self, MsgAddress::Null)
    }
}

impl From<RawAddress> for MsgAddress {
    fn from(raw: RawAddress) -> Self {
        MsgAddress::Internal(raw)
    }
}

impl fmt::Display for MsgAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgAddress::Null => Ok(()),
            MsgAddress::Internal(raw) => write!(f, "{}", raw),
        }
    }
}

/// Presentation flags of a user-friendly address.
///
/// These are not part of the address identity; the same [`RawAddress`]
/// renders to four different strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressFlags {
    pub bounceable: bool,
    pub test_only: bool,
}

impl AddressFlags {
    pub const fn new(bounceable: bool, test_only: bool) -> Self {
        AddressFlags {
            bounceable,
            test_only,
        }
    }

    /// Tag byte for these flags.
    pub fn tag(&self) -> u8 {
        let base = if self.bounceable {
            BOUNCEABLE_TAG
        } else {
            NON_BOUNCEABLE_TAG
        };
        if self.test_only { base | TEST_ONLY_FLAG } else { base }
    }

    /// Decode a tag byte; `None` for unrecognized tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        let test_only = tag & TEST_ONLY_FLAG != 0;
        match tag & !TEST_ONLY_FLAG {
            BOUNCEABLE_TAG => Some(Self::new(true, test_only)),
            NON_BOUNCEABLE_TAG => Some(Self::new(false, test_only)),
            _ => None,
        }
    }
}

/// A user-friendly address: raw identity plus presentation flags.
///
/// # Example
///
/// ```
/// use ton_cell::{AddressFlags, FormattedAddress, RawAddress};
///
/// let friendly = FormattedAddress::new(RawAddress::new(0, [0; 32]), AddressFlags::new(true, false));
/// assert_eq!(friendly.to_string(), "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattedAddress {
    address: RawAddress,
    flags: AddressFlags,
}

impl FormattedAddress {
    pub fn new(address: RawAddress, flags: AddressFlags) -> Self {
        FormattedAddress { address, flags }
    }

    /// The underlying raw address.
    pub fn address(&self) -> RawAddress {
        self.address
    }

    pub fn flags(&self) -> AddressFlags {
        self.flags
    }

    /// Same address, different presentation.
    pub fn with_flags(&self, flags: AddressFlags) -> Self {
        FormattedAddress {
            address: self.address,
            flags,
        }
    }

    /// Tag, workchain and hash: the 34 bytes covered by the checksum.
    fn payload(&self) -> [u8; 34] {
        let mut payload = [0u8; 34];
        payload[0] = self.flags.tag();
        payload[1] = self.address.workchain as u8;
        payload[2..].copy_from_slice(&self.address.hash);
        payload
    }

    /// CRC16-XMODEM over the payload.
    pub fn checksum(&self) -> u16 {
        crc16_xmodem(&self.payload())
    }

    /// The 36 bytes behind the base64 text.
    pub fn to_bytes(&self) -> [u8; FRIENDLY_ADDRESS_BYTES] {
        let mut bytes = [0u8; FRIENDLY_ADDRESS_BYTES];
        let payload = self.payload();
        bytes[..34].copy_from_slice(&payload);
        bytes[34..].copy_from_slice(&crc16_xmodem(&payload).to_be_bytes());
        bytes
    }

    /// Decode the 36 raw bytes of a user-friendly address.
    ///
    /// The checksum is verified before the tag, so any single corrupted bit
    /// is reported as [`CellError::ChecksumMismatch`].
    pub fn from_bytes(bytes: &[u8]) -> CellResult<Self> {
        if bytes.len() != FRIENDLY_ADDRESS_BYTES {
            return Err(CellError::MalformedAddress(format!(
                "User-friendly address must be {} bytes, got {}",
                FRIENDLY_ADDRESS_BYTES,
                bytes.len()
            )));
        }

        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        let actual = crc16_xmodem(&bytes[..34]);
        if expected != actual {
            return Err(CellError::ChecksumMismatch { expected, actual });
        }

        let flags = AddressFlags::from_tag(bytes[0])
            .ok_or_else(|| CellError::MalformedAddress(format!("Unknown tag byte: 0x{:02x}", bytes[0])))?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);

        Ok(FormattedAddress {
            address: RawAddress::new(bytes[1] as i8, hash),
            flags,
        })
    }

    /// Parse a user-friendly address string.
    ///
    /// Both the URL-safe and the standard base64 alphabet are accepted.
    pub fn parse(s: &str) -> CellResult<Self> {
        let normalized: String = s
            .trim()
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                c => c,
            })
            .collect();

        let bytes = URL_SAFE_NO_PAD
            .decode(normalized.as_bytes())
            .map_err(|e| CellError::MalformedAddress(format!("Invalid base64: {}", e)))?;

        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for FormattedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.to_bytes()))
    }
}

impl FromStr for FormattedAddress {
    type Err = CellError;

    fn from_str(s: &str) -> CellResult<Self> {
        Self::parse(s)
    }
}
