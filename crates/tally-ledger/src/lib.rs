//! # Tally Ledger - Layer 3: Storage
//!
//! **Purpose**: Persist account balances and chain tracking state.
//!
//! # Architecture Constraints
//!
//! **Layer 3 depends on tally-core and tally-token.**
//! - YES Atomic credit/debit with a non-negativity invariant
//! - YES Audit edges between addresses and entries
//! - YES Chain metadata persistence behind the `ChainStore` trait
//! - NO entry validation (that's tally-token)
//! - NO block sequencing or chain classification (that's tally-node)
//!
//! ## Core Concepts
//!
//! - **Ledger**: one SQLite database per tracked chain
//! - **BlockWriter**: the writes of one block, committed together; each
//!   applied entry is isolated in its own savepoint
//! - **ChainMetadata**: height plus the terminal Unknown/Ignored/Tracked decision

#![forbid(unsafe_code)]

/// Chain tracking state
pub mod chain;

/// Chain metadata stores
pub mod chain_store;

/// Ledger error types
pub mod errors;

/// Balance ledger
pub mod ledger;

mod schema;

pub use chain::{ChainMetadata, ChainStatus, TrackedChain};
pub use chain_store::{ChainStore, MemoryChainStore, SqliteChainStore};
pub use errors::{LedgerError, LedgerResult};
pub use ledger::{
    ledger_file_name, AddressId, AddressTransaction, BlockWriter, EntryId, EntryRecord, Ledger,
};
pub use schema::COINBASE_ADDRESS_ID;
