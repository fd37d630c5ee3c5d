//! Validation errors for token entries
//!
//! Every error is a value the block processor uses to reject a single entry.
//! Variants carry the machine-readable classification (and ExtIDs position
//! where one applies); `Display` renders the stable protocol message.

use std::num::ParseIntError;
use tally_core::{Address, RcdError};

/// Failure of the generic ExtIDs authorization check
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtIdsError {
    /// ExtIDs count is not `1 + 2n`
    #[error("invalid number of ExtIDs")]
    InvalidCount {
        /// Required count for the signer set
        expected: usize,
        /// Count present on the entry
        actual: usize,
    },

    /// ExtIDs[0] is not a base-10 integer
    #[error("timestamp salt: {0}")]
    SaltFormat(ParseIntError),

    /// Salt is outside the anti-replay window around the commit time
    #[error("timestamp salt expired")]
    SaltExpired {
        /// Parsed salt in Unix seconds
        salt: i64,
        /// Entry commit time in Unix seconds
        timestamp: i64,
    },

    /// An RCD/signature pair failed; `position` is the ExtIDs index
    #[error("ExtIDs[{position}]: {kind}")]
    Authorization {
        /// Index into the entry's ExtIDs
        position: usize,
        /// What failed
        kind: RcdError,
    },
}

impl ExtIdsError {
    /// Authorization failure kind and position, if this is one
    pub fn authorization(&self) -> Option<(RcdError, usize)> {
        match self {
            Self::Authorization { position, kind } => Some((*kind, *position)),
            _ => None,
        }
    }
}

/// Failure to decode structured entry content
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// Content is empty
    #[error("unexpected end of JSON input")]
    Empty,

    /// Content is not a JSON object
    #[error("{0}")]
    Syntax(String),

    /// Content has a key outside the recognized field set
    #[error("unexpected JSON length")]
    UnknownField {
        /// The unrecognized key
        field: String,
    },

    /// A recognized field has the wrong shape
    #[error("\"{field}\": {message}")]
    Field {
        /// Field name
        field: &'static str,
        /// Decoder message
        message: String,
    },
}

/// Failure to validate or encode an issuance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuanceError {
    /// Content could not be decoded
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Token standard tag is not recognized
    #[error("invalid \"type\": \"{0}\"")]
    InvalidType(String),

    /// Supply is zero or negative other than -1
    #[error("invalid \"supply\": must be positive or -1")]
    InvalidSupply(i64),

    /// Metadata is not well-formed JSON
    #[error("invalid \"metadata\": {0}")]
    InvalidMetadata(String),

    /// ExtIDs authorization failed
    #[error(transparent)]
    ExtIds(#[from] ExtIdsError),

    /// Entry was signed by a key other than the issuer's
    #[error("invalid RCD")]
    InvalidIssuer,
}

/// Failure to validate or encode a transaction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// Content could not be decoded
    #[error(transparent)]
    Content(#[from] ContentError),

    /// No inputs
    #[error("invalid \"inputs\": empty")]
    NoInputs,

    /// No outputs
    #[error("invalid \"outputs\": empty")]
    NoOutputs,

    /// Input and output totals differ
    #[error("sum(inputs) != sum(outputs): {inputs} != {outputs}")]
    Unbalanced {
        /// Total of inputs
        inputs: u64,
        /// Total of outputs
        outputs: u64,
    },

    /// A total does not fit in 64 bits
    #[error("amount overflow")]
    Overflow,

    /// An address is both spent from and paid to
    #[error("{0} appears in both inputs and outputs")]
    Overlap(Address),

    /// Coinbase input is combined with other inputs
    #[error("coinbase transaction must have exactly one input")]
    MixedCoinbase,

    /// Metadata is not well-formed JSON
    #[error("invalid \"metadata\": {0}")]
    InvalidMetadata(String),

    /// ExtIDs authorization failed
    #[error(transparent)]
    ExtIds(#[from] ExtIdsError),

    /// Signer set does not match the input addresses
    #[error("invalid RCDs: signers do not match inputs")]
    SignerMismatch,

    /// Coinbase was signed by a key other than the issuer's
    #[error("invalid RCD")]
    InvalidIssuer,
}
