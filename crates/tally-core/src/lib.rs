//! # Tally Core - Layer 1: Foundation
//!
//! **Purpose**: Define the identifiers, entries, and authorization primitive
//! shared by every other Tally crate.
//!
//! # Architecture Constraints
//!
//! - YES Pure value types (`Bytes32`, `Address`, `Entry`)
//! - YES The RCD authorization primitive
//! - YES Hash functions used for addressing and signing
//! - NO protocol rules (that's tally-token)
//! - NO persistence (that's tally-ledger)
//! - NO block orchestration (that's tally-node)

#![forbid(unsafe_code)]

/// Address derivation and text form
pub mod address;

/// 32-byte identifiers
pub mod bytes;

/// Signed ledger entries
pub mod entry;

/// Parse errors
pub mod errors;

/// Hash functions
pub mod hash;

/// RCD authorization primitive
pub mod rcd;

pub use address::Address;
pub use bytes::{Bytes32, ChainId, EntryHash};
pub use entry::{Entry, MAX_EXT_IDS_SIZE};
pub use errors::{ParseError, ParseResult};
pub use rcd::{validate_rcd, Rcd, RcdError, RCD_SIZE, RCD_TYPE, SIGNATURE_SIZE};

// Re-exported so callers can sign entries without a direct dependency.
pub use ed25519_dalek::SigningKey;
