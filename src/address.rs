use std::fmt;
use std::str::FromStr;

use ethers::types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const WALLET_ADDRESS_BYTES: usize = 20;
pub const MAX_PROFILE_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("wallet address cannot be empty")]
    Empty,
    #[error("failed to decode wallet address as hex: {0}")]
    InvalidHex(String),
    #[error("wallet address must be {WALLET_ADDRESS_BYTES} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account address, always held as lower-case `0x`-prefixed hex.
///
/// Every lookup key in the registry and every tree `visited` entry goes
/// through this type, so two spellings of the same address always compare
/// equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        let bytes = hex::decode(strip_hex_prefix(trimmed))
            .map_err(|err| AddressError::InvalidHex(err.to_string()))?;
        if bytes.len() != WALLET_ADDRESS_BYTES {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    #[cfg(test)]
    pub fn zero() -> Self {
        Self::from(Address::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().skip(2).all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_h160(&self) -> Address {
        let bytes = hex::decode(&self.0[2..]).unwrap_or_default();
        assert_eq!(
            bytes.len(),
            WALLET_ADDRESS_BYTES,
            "Normalized wallet address lost its width"
        );
        Address::from_slice(&bytes)
    }
}

impl From<Address> for WalletAddress {
    fn from(value: Address) -> Self {
        Self(format!("0x{}", hex::encode(value.as_bytes())))
    }
}

impl FromStr for WalletAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletAddress({})", self.0)
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Trims a caller supplied profile identifier and enforces the storage bound.
pub fn sanitize_profile_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_PROFILE_ID_LEN {
        return None;
    }
    Some(trimmed.to_string())
}

fn strip_hex_prefix(value: &str) -> &str {
    if value.starts_with("0x") || value.starts_with("0X") {
        &value[2..]
    } else {
        value
    }
}
