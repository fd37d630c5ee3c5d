//! Token holder addresses
//!
//! An address is the SHA-256d hash of an RCD. Its external representation is
//! lowercase hex, which round-trips through [`FromStr`].

use crate::errors::{decode_hex32, ParseError};
use crate::hash::sha256d;
use crate::rcd::Rcd;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 32-byte public-key-hash identifier of a token holder
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Derive the address identified by raw RCD bytes
    pub fn from_rcd_bytes(rcd: &[u8]) -> Self {
        Self(sha256d(rcd))
    }

    /// Derive the address of an Ed25519 public key
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Rcd::from_public_key(public_key).address()
    }

    /// The reserved coinbase address.
    ///
    /// Coinbase transactions spend from this address to mint new tokens. Its
    /// RCD carries the all-zero public key, which nobody can sign for.
    pub fn coinbase() -> Self {
        Self::from_public_key(&[0u8; 32])
    }

    /// Whether this is the reserved coinbase address
    pub fn is_coinbase(&self) -> bool {
        *self == Self::coinbase()
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex32(s).map(Self)
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
