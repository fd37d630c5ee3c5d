//! # Tally Node - Layer 4: Runtime
//!
//! **Purpose**: Turn blocks from an external ledger into token balances.
//!
//! # Architecture Constraints
//!
//! **Layer 4 composes tally-core, tally-token, and tally-ledger.**
//! - YES Block sequencing and the skip/replay rules
//! - YES First-block chain classification and operator lists
//! - YES Per-chain serialization and multi-chain catch-up
//! - YES Node configuration
//! - NO network block fetching (callers implement `BlockSource`)
//! - NO entry validation rules (that's tally-token)
//!
//! ## Core Concepts
//!
//! - **BlockSource**: collaborator that yields populated blocks and resolves
//!   issuer identities
//! - **BlockProcessor**: applies one block of one chain
//! - **Follower**: catches many chains up in parallel, one worker per chain

#![forbid(unsafe_code)]

/// Blocks and the block source collaborator
pub mod block;

/// Node configuration
pub mod config;

/// Node error types
pub mod errors;

/// Multi-chain catch-up
pub mod follower;

/// Per-chain ledger cache
pub mod ledgers;

/// Block processor
pub mod processor;

/// First-block chain classification
pub mod tracking;

pub use block::{Block, BlockSource, MemoryBlockSource};
pub use config::{NodeConfig, CHAIN_STORE_FILE};
pub use errors::{ConfigError, ProcessError, SourceError};
pub use follower::{CatchUpReport, ChainProgress, Follower};
pub use ledgers::{LedgerLocation, LedgerSet};
pub use processor::{BlockOutcome, BlockProcessor};
pub use tracking::{classify_chain, TrackingPolicy};
