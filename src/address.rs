//! Wallet address normalization
//!
//! Wallet addresses arrive from clients in whatever case their wallet
//! software produced. They are canonicalized to the lowercase
//! `0x` + 40 hex form before being used as storage keys or compared with a
//! recovered signer. EIP-55 checksums are advisory: a mixed-case address whose
//! checksum does not match is still accepted and lower-cased.

use crate::crypto::keccak256;
use crate::{AuthError, Result};
use ethereum_types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Length of a textual address including the `0x` prefix
pub const ADDRESS_STRING_LEN: usize = 42;

/// A validated wallet address in canonical lowercase form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalAddress(Address);

impl CanonicalAddress {
    /// Wrap an already-decoded 20-byte address
    pub fn from_address(address: Address) -> Self {
        Self(address)
    }

    /// The raw 20-byte address
    pub fn as_address(&self) -> &Address {
        &self.0
    }

    /// EIP-55 mixed-case representation
    pub fn to_checksum(&self) -> String {
        to_checksum_address(self)
    }

    /// Whether `raw` is spelled exactly as the EIP-55 checksum of this address
    pub fn is_checksum_valid(&self, raw: &str) -> bool {
        raw.trim() == self.to_checksum()
    }
}

impl std::fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl FromStr for CanonicalAddress {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        normalize(s)
    }
}

impl From<Address> for CanonicalAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl Serialize for CanonicalAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        normalize(&raw).map_err(serde::de::Error::custom)
    }
}

/// Validate and canonicalize a raw wallet address string
pub fn normalize(raw: &str) -> Result<CanonicalAddress> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::invalid_address("Wallet address is required"));
    }

    let hex_part = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| AuthError::invalid_address("Wallet address must start with 0x"))?;

    if trimmed.len() != ADDRESS_STRING_LEN {
        return Err(AuthError::invalid_address(format!(
            "Wallet address must be {} characters long",
            ADDRESS_STRING_LEN
        )));
    }

    if !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::invalid_address(
            "Wallet address must contain only hex characters",
        ));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|_| AuthError::invalid_address("Wallet address is not valid hex"))?;
    let address = CanonicalAddress(Address::from_slice(&bytes));

    let is_mixed_case = hex_part.bytes().any(|b| b.is_ascii_uppercase())
        && hex_part.bytes().any(|b| b.is_ascii_lowercase());
    if is_mixed_case && !address.is_checksum_valid(trimmed) {
        tracing::debug!(wallet = %address, "Checksum mismatch, accepting lowercase form");
    }

    Ok(address)
}

/// Compute the EIP-55 checksum spelling of an address
pub fn to_checksum_address(address: &CanonicalAddress) -> String {
    let lower = hex::encode(address.as_address().as_bytes());
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(ADDRESS_STRING_LEN);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
