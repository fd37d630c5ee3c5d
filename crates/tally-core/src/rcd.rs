//! Redeem Condition Datum (RCD) authorization primitive
//!
//! An RCD describes how to verify that a holder authorized a message. The only
//! supported type is a single Ed25519 key: one type byte followed by the 32-byte
//! public key. The SHA-256d hash of the RCD bytes is the holder's [`Address`].
//!
//! Verification is pure: it checks that an RCD and a signature are internally
//! consistent for a message. Binding the pair to a particular entry position is
//! the caller's job (see the entry validator in `tally-token`).

use crate::address::Address;
use ed25519_dalek::{Signature, VerifyingKey};

/// Type byte of the Ed25519 RCD
pub const RCD_TYPE: u8 = 0x01;

/// Byte length of an Ed25519 RCD: type byte plus public key
pub const RCD_SIZE: usize = 1 + 32;

/// Byte length of an Ed25519 signature
pub const SIGNATURE_SIZE: usize = 64;

/// Why an RCD/signature pair failed to authorize a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum RcdError {
    /// RCD length does not match its type
    #[error("invalid RCD size")]
    InvalidRcdSize,

    /// Leading type byte is not recognized
    #[error("invalid RCD type")]
    InvalidRcdType,

    /// Signature length is not 64 bytes
    #[error("invalid signature size")]
    InvalidSignatureSize,

    /// Signature does not verify against the RCD's key
    #[error("invalid signature")]
    InvalidSignature,
}

/// An Ed25519 redeem condition datum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rcd([u8; RCD_SIZE]);

impl Rcd {
    /// Build the RCD for an Ed25519 public key
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let mut bytes = [0u8; RCD_SIZE];
        bytes[0] = RCD_TYPE;
        bytes[1..].copy_from_slice(public_key);
        Self(bytes)
    }

    /// Parse RCD bytes, checking size and type but not the key itself
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RcdError> {
        if bytes.len() != RCD_SIZE {
            return Err(RcdError::InvalidRcdSize);
        }
        if bytes[0] != RCD_TYPE {
            return Err(RcdError::InvalidRcdType);
        }
        let mut out = [0u8; RCD_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Raw RCD bytes
    pub fn as_bytes(&self) -> &[u8; RCD_SIZE] {
        &self.0
    }

    /// Embedded public key
    pub fn public_key(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.0[1..]);
        key
    }

    /// Address identified by this RCD
    pub fn address(&self) -> Address {
        Address::from_rcd_bytes(&self.0)
    }

    /// Verify a signature over `message` with the embedded key
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> Result<(), RcdError> {
        if signature.len() != SIGNATURE_SIZE {
            return Err(RcdError::InvalidSignatureSize);
        }
        let mut sig_bytes = [0u8; SIGNATURE_SIZE];
        sig_bytes.copy_from_slice(signature);
        let signature = Signature::from_bytes(&sig_bytes);

        // A key that is not a curve point can never have signed anything.
        let verifying_key =
            VerifyingKey::from_bytes(&self.public_key()).map_err(|_| RcdError::InvalidSignature)?;

        verifying_key
            .verify_strict(message, &signature)
            .map_err(|_| RcdError::InvalidSignature)
    }
}

/// Validate an RCD/signature pair over a message and return the RCD's address.
///
/// Checks run in order: RCD size, RCD type, signature size, signature.
pub fn validate_rcd(rcd: &[u8], signature: &[u8], message: &[u8]) -> Result<Address, RcdError> {
    let rcd = Rcd::from_bytes(rcd)?;
    rcd.verify(signature, message)?;
    Ok(rcd.address())
}
