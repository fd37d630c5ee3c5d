//! Per-chain tracking state
//!
//! A chain starts `Unknown` and is classified exactly once, on its first
//! block, as either `Ignored` or `Tracked`. The classification is terminal.

use serde::{Deserialize, Serialize};
use tally_core::{Address, ChainId};
use tally_token::{Issuance, TokenNameIds};

/// Tracking decision for a chain
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainStatus {
    /// Not yet classified
    #[default]
    Unknown,
    /// Permanently skipped
    Ignored,
    /// Followed as a token ledger
    Tracked(TrackedChain),
}

/// State of a tracked token chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedChain {
    /// Name tags from the chain's first entry
    pub name_ids: TokenNameIds,
    /// Address allowed to issue and mint
    pub issuer: Address,
    /// Accepted issuance, once one has been seen
    pub issuance: Option<Issuance>,
    /// Total minted through coinbase transactions
    pub issued: u64,
}

impl TrackedChain {
    /// Start tracking with no issuance yet
    pub fn new(name_ids: TokenNameIds, issuer: Address) -> Self {
        Self {
            name_ids,
            issuer,
            issuance: None,
            issued: 0,
        }
    }

    /// Amount still mintable, `None` when unbounded or not yet issued
    pub fn remaining_supply(&self) -> Option<u64> {
        let max = self.issuance.as_ref()?.max_supply()?;
        Some(max.saturating_sub(self.issued))
    }

    /// Whether minting `amount` stays within the declared supply
    pub fn can_mint(&self, amount: u64) -> bool {
        match &self.issuance {
            None => false,
            Some(issuance) => match issuance.max_supply() {
                None => self.issued.checked_add(amount).is_some(),
                Some(max) => self
                    .issued
                    .checked_add(amount)
                    .is_some_and(|total| total <= max),
            },
        }
    }
}

/// Persisted state of one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    /// Chain identifier
    pub chain_id: ChainId,
    /// Last processed block height, `None` before the first block
    pub height: Option<u32>,
    /// Tracking decision
    pub status: ChainStatus,
    /// Set once the chain's ledger reported corruption; no further blocks
    /// are processed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
}

impl ChainMetadata {
    /// Metadata for a chain seen for the first time
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            height: None,
            status: ChainStatus::Unknown,
            halted: false,
        }
    }

    /// Whether the chain has been permanently skipped
    pub fn is_ignored(&self) -> bool {
        matches!(self.status, ChainStatus::Ignored)
    }

    /// Tracked state, if the chain is tracked
    pub fn tracked(&self) -> Option<&TrackedChain> {
        match &self.status {
            ChainStatus::Tracked(tracked) => Some(tracked),
            _ => None,
        }
    }

    /// Mutable tracked state, if the chain is tracked
    pub fn tracked_mut(&mut self) -> Option<&mut TrackedChain> {
        match &mut self.status {
            ChainStatus::Tracked(tracked) => Some(tracked),
            _ => None,
        }
    }

    /// Whether a block at `height` has already been covered
    pub fn has_processed(&self, height: u32) -> bool {
        self.height.is_some_and(|recorded| height <= recorded)
    }

    /// Record that the block at `height` has been handled
    pub fn advance(&mut self, height: u32) {
        self.height = Some(self.height.map_or(height, |h| h.max(height)));
    }

    /// Pick whichever of two records for the same chain is further along.
    /// A halt recorded by either one is kept.
    pub fn newest(self, other: Self) -> Self {
        let halted = self.halted || other.halted;
        let mut newest = if other.height > self.height {
            other
        } else {
            self
        };
        newest.halted = halted;
        newest
    }
}
