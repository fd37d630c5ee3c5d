//! Ledger and store error types

use tally_core::{Address, ChainId, EntryHash};

/// Errors raised by the balance ledger and chain stores
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A debit would take an address below zero, or the address is unknown
    #[error("insufficient balance: {0}")]
    InsufficientBalance(Address),

    /// A credit would exceed the largest representable balance
    #[error("balance overflow: {0}")]
    BalanceOverflow(Address),

    /// An amount does not fit the store's integer column
    #[error("amount out of range: {0}")]
    AmountOutOfRange(u64),

    /// An entry with this hash was already applied
    #[error("entry already applied: {0}")]
    Replay(EntryHash),

    /// The ledger file belongs to a different chain
    #[error("ledger belongs to chain {found}, expected {expected}")]
    ChainMismatch {
        /// Chain the caller asked for
        expected: ChainId,
        /// Chain recorded in the ledger
        found: ChainId,
    },

    /// A store invariant no longer holds
    #[error("ledger corrupted: {0}")]
    Corrupted(String),

    /// Database error from SQLite
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored chain metadata could not be encoded or decoded
    #[error("metadata encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    /// I/O error while preparing the ledger directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether this error rejects a single entry rather than the whole block
    pub fn is_entry_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance(_)
                | Self::BalanceOverflow(_)
                | Self::AmountOutOfRange(_)
                | Self::Replay(_)
        )
    }

    /// Whether this error means the store can no longer be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted(_))
    }
}

/// Result alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
