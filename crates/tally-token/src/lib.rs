//! # Tally Token - Layer 2: Protocol Rules
//!
//! **Purpose**: Decide whether a single entry is a well-formed, authorized
//! token operation. Everything here is a pure function of the entry and the
//! expected issuer; no ledger state is read or written.
//!
//! ## Core Concepts
//!
//! - **ExtIDs authorization**: timestamp salt plus ordered RCD/signature pairs
//! - **Name tags**: the first-entry pattern that marks a chain as a token
//! - **Issuance**: the declaration that activates a tracked chain
//! - **Transaction**: balanced transfers and issuer-signed coinbase mints

#![forbid(unsafe_code)]

mod content;

/// Validation error types
pub mod errors;

/// Generic ExtIDs authorization
pub mod ext_ids;

/// Issuance declarations
pub mod issuance;

/// Token chain name tags
pub mod name_ids;

/// Transfer transactions
pub mod transaction;

pub use errors::{ContentError, ExtIdsError, IssuanceError, TransactionError};
pub use ext_ids::{parse_salt, validate_ext_ids, SALT_WINDOW_SECS};
pub use issuance::{validate_issuance, Issuance, TOKEN_STANDARD, UNLIMITED_SUPPLY};
pub use name_ids::{chain_id_from_name_ids, is_token_name_ids, TokenNameIds};
pub use transaction::{validate_transaction, Transaction};
