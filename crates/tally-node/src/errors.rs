//! Node error types

use std::path::PathBuf;
use tally_core::ChainId;
use tally_ledger::LedgerError;

/// Failure reported by a block source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The block could not be fetched
    #[error("block unavailable: chain {chain_id} height {height}")]
    Unavailable {
        /// Chain requested
        chain_id: ChainId,
        /// Height requested
        height: u32,
    },

    /// The issuer identity chain has no usable key
    #[error("unknown identity chain: {0}")]
    UnknownIdentity(ChainId),

    /// Transport or remote failure
    #[error("block source: {0}")]
    Transport(String),
}

/// Failure to process a block
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The block's entries are missing or do not match their hashes
    #[error("incomplete data: chain {chain_id} height {height}")]
    IncompleteData {
        /// Chain of the block
        chain_id: ChainId,
        /// Height of the block
        height: u32,
    },

    /// The block source failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The chain's ledger failed
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// The chain store failed
    #[error("chain store: {0}")]
    Store(LedgerError),

    /// The chain stopped after its ledger reported corruption
    #[error("chain {0} halted after ledger corruption")]
    ChainHalted(ChainId),
}

impl ProcessError {
    /// Whether retrying the same block later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IncompleteData { .. } | Self::Source(_))
    }
}

/// Failure to load or validate node configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("failed to parse config file {path}: {message}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// A setting is out of range or contradictory
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Bytes32;

    #[test]
    fn only_transient_failures_are_retryable() {
        let chain_id = Bytes32([1; 32]);
        assert!(ProcessError::IncompleteData { chain_id, height: 3 }.is_retryable());
        assert!(ProcessError::from(SourceError::Transport("timeout".into())).is_retryable());
        assert!(!ProcessError::ChainHalted(chain_id).is_retryable());
        assert!(!ProcessError::from(LedgerError::Corrupted("x".into())).is_retryable());
    }
}
